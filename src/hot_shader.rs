use std::io::Write;
use std::path::Path;

use crate::buffer::GrowableBuffer;
use crate::compiler::{FULLSCREEN_VERT, ShaderBackend, ShaderError, Stage, image_source};
use crate::error::InitError;
use crate::watcher::FileWatcher;

/// Whether a drawable program is currently active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadState {
    /// No program: either nothing has built yet or the last attempt failed.
    NoProgram,
    Valid,
}

/// What a single [`HotReloadController::poll`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The file was unchanged or unreadable; nothing was touched.
    Unchanged,
    /// A new program was built and is now active.
    Reloaded,
    /// The rebuild failed; the diagnostic log holds the reason.
    Failed,
}

/// Owns the watched image shader and keeps it in sync with the file on disk.
///
/// Every attempt to rebuild first drops the active program, so a failed edit
/// leaves nothing to draw but the diagnostic log. The file timestamp is only
/// recorded after a successful build, so a broken file is retried on every
/// poll until it is fixed.
pub struct HotReloadController<B: ShaderBackend> {
    backend: B,
    watcher: FileWatcher,
    vertex: B::Shader,
    program: Option<B::Program>,
    log: GrowableBuffer<u8>,
    /// Last diagnostic logged as a warning, so retries of the same broken
    /// file stay quiet.
    reported: GrowableBuffer<u8>,
    contents: GrowableBuffer<u8>,
}

impl<B: ShaderBackend> HotReloadController<B> {
    /// Create a controller watching `path`. Nothing is loaded until the first
    /// [`poll`](Self::poll).
    ///
    /// Fails if the shared fullscreen vertex shader does not compile.
    pub fn new(backend: B, path: impl AsRef<Path>) -> Result<Self, InitError> {
        let mut log = GrowableBuffer::new();
        let vertex = backend
            .compile(Stage::Vertex, &[FULLSCREEN_VERT], &mut log)
            .map_err(|_| InitError::BuiltinShader {
                name: "fullscreen vertex",
                log: String::from_utf8_lossy(&log).into_owned(),
            })?;

        Ok(Self {
            backend,
            watcher: FileWatcher::new(path),
            vertex,
            program: None,
            log: GrowableBuffer::new(),
            reported: GrowableBuffer::new(),
            contents: GrowableBuffer::new(),
        })
    }

    /// Check the watched file and rebuild the program if it changed since the
    /// last successful build.
    pub fn poll(&mut self) -> ReloadOutcome {
        let Some(modified) = self.watcher.poll(&mut self.contents) else {
            return ReloadOutcome::Unchanged;
        };

        log::debug!("reloading {:?}", self.watcher.path());

        // Dropped even if the new source turns out to be broken as well.
        self.program = None;

        let result = {
            let body = String::from_utf8_lossy(&self.contents);
            build(&self.backend, &self.vertex, &body, &mut self.log)
        };

        match result {
            Ok(program) => {
                self.program = Some(program);
                self.log.clear();
                self.reported.clear();
                self.watcher.mark_applied(modified);
                log::info!("shader built successfully");
                ReloadOutcome::Reloaded
            }
            Err(error) => {
                if self.log.is_empty() {
                    let _ = write!(self.log, "{error}");
                }
                self.report_failure(error);
                ReloadOutcome::Failed
            }
        }
    }

    /// Warn about a failed build unless the same diagnostic was the last one
    /// reported. Returns whether a warning was emitted.
    fn report_failure(&mut self, error: ShaderError) -> bool {
        if self.log[..] == self.reported[..] {
            log::debug!("{:?} still fails with the same diagnostic", self.watcher.path());
            return false;
        }

        log::warn!(
            "{}:\n{}",
            error,
            String::from_utf8_lossy(&self.log).trim_end()
        );
        self.reported.clear();
        self.reported.extend_from_slice(&self.log);
        true
    }

    pub fn state(&self) -> ReloadState {
        match self.program {
            Some(_) => ReloadState::Valid,
            None => ReloadState::NoProgram,
        }
    }

    /// The active program, if the last build succeeded.
    pub fn program(&self) -> Option<&B::Program> {
        self.program.as_ref()
    }

    /// Diagnostic text of the last failed build. Empty after a success.
    pub fn log(&self) -> &[u8] {
        &self.log
    }

    pub fn watcher(&self) -> &FileWatcher {
        &self.watcher
    }
}

fn build<B: ShaderBackend>(
    backend: &B,
    vertex: &B::Shader,
    body: &str,
    log: &mut GrowableBuffer<u8>,
) -> Result<B::Program, ShaderError> {
    let fragment = backend.compile(Stage::Fragment, &image_source(body), log)?;
    backend.link(vertex, &fragment, log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs::{self, File};
    use std::time::{Duration, SystemTime};

    /// Backend that fails any source containing `#error`, counting compiles.
    #[derive(Default)]
    struct ScriptedBackend {
        compiles: Cell<usize>,
    }

    impl ShaderBackend for ScriptedBackend {
        type Shader = String;
        type Program = String;

        fn compile(
            &self,
            stage: Stage,
            fragments: &[&str],
            log: &mut GrowableBuffer<u8>,
        ) -> Result<String, ShaderError> {
            self.compiles.set(self.compiles.get() + 1);
            let source = fragments.concat();
            if source.contains("#error") {
                log.clear();
                log.extend_from_slice(b"0:1: error: scripted failure");
                return Err(ShaderError::Compile { stage });
            }
            Ok(source)
        }

        fn link(
            &self,
            _vertex: &String,
            fragment: &String,
            log: &mut GrowableBuffer<u8>,
        ) -> Result<String, ShaderError> {
            if fragment.contains("LINK_FAIL") {
                log.clear();
                return Err(ShaderError::Link);
            }
            Ok(fragment.clone())
        }
    }

    fn write_at(path: &Path, body: &str, secs: u64) -> SystemTime {
        fs::write(path, body).unwrap();
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
        time
    }

    #[test]
    fn starts_without_program() {
        let dir = tempfile::tempdir().unwrap();
        let controller =
            HotReloadController::new(ScriptedBackend::default(), dir.path().join("a.glsl"))
                .unwrap();

        assert_eq!(controller.state(), ReloadState::NoProgram);
        assert!(controller.log().is_empty());
        assert!(controller.program().is_none());
    }

    #[test]
    fn failure_retries_same_content_every_poll() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.glsl");
        write_at(&path, "#error", 100);

        let mut controller = HotReloadController::new(ScriptedBackend::default(), &path).unwrap();
        let vertex_compiles = controller.backend.compiles.get();

        for attempt in 1..=3 {
            assert_eq!(controller.poll(), ReloadOutcome::Failed);
            assert_eq!(controller.state(), ReloadState::NoProgram);
            assert_eq!(controller.log(), b"0:1: error: scripted failure");
            assert_eq!(controller.backend.compiles.get(), vertex_compiles + attempt);
        }
        assert_eq!(controller.watcher().applied(), None);
    }

    #[test]
    fn success_is_not_rebuilt_until_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.glsl");
        let mtime = write_at(&path, "void mainImage() {}", 100);

        let mut controller = HotReloadController::new(ScriptedBackend::default(), &path).unwrap();
        assert_eq!(controller.poll(), ReloadOutcome::Reloaded);
        assert_eq!(controller.watcher().applied(), Some(mtime));

        let compiles = controller.backend.compiles.get();
        assert_eq!(controller.poll(), ReloadOutcome::Unchanged);
        assert_eq!(controller.backend.compiles.get(), compiles);
        assert_eq!(controller.state(), ReloadState::Valid);
    }

    #[test]
    fn link_failure_without_text_still_logs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.glsl");
        write_at(&path, "// LINK_FAIL", 100);

        let mut controller = HotReloadController::new(ScriptedBackend::default(), &path).unwrap();
        assert_eq!(controller.poll(), ReloadOutcome::Failed);
        assert_eq!(controller.log(), b"program failed to link");
    }

    #[test]
    fn same_diagnostic_is_warned_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.glsl");
        write_at(&path, "#error", 100);

        let mut controller = HotReloadController::new(ScriptedBackend::default(), &path).unwrap();
        assert_eq!(controller.poll(), ReloadOutcome::Failed);
        assert_eq!(&controller.reported[..], controller.log());

        assert_eq!(controller.poll(), ReloadOutcome::Failed);
        assert!(!controller.report_failure(ShaderError::Compile { stage: Stage::Fragment }));

        write_at(&path, "// LINK_FAIL", 200);
        assert_eq!(controller.poll(), ReloadOutcome::Failed);
        assert_eq!(&controller.reported[..], b"program failed to link");

        write_at(&path, "void mainImage() {}", 300);
        assert_eq!(controller.poll(), ReloadOutcome::Reloaded);
        assert!(controller.reported.is_empty());
    }

    #[test]
    fn unreadable_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.glsl");
        write_at(&path, "void mainImage() {}", 100);

        let mut controller = HotReloadController::new(ScriptedBackend::default(), &path).unwrap();
        assert_eq!(controller.poll(), ReloadOutcome::Reloaded);

        fs::remove_file(&path).unwrap();
        assert_eq!(controller.poll(), ReloadOutcome::Unchanged);
        assert_eq!(controller.state(), ReloadState::Valid);
    }
}
