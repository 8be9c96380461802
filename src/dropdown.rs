/// Visibility of the noise panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoiseDropdown {
    visible: bool,
}

impl NoiseDropdown {
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(self) -> bool {
        self.visible
    }
}
