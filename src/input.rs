use glam::Vec2;
use winit::event::WindowEvent;

/// Tracks the cursor for the `iMouse` input.
pub struct Input {
    mouse_position: Vec2,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            // Unknown until the cursor first moves over the window.
            mouse_position: Vec2::splat(-1.0),
        }
    }
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a window event and update input state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        if let WindowEvent::CursorMoved { position, .. } = event {
            self.mouse_position = Vec2::new(position.x as f32, position.y as f32);
        }
    }

    /// Current mouse position in window coordinates.
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }
}
