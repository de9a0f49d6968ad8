#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const GREY: Rgb = Rgb::new(128, 128, 128);
    pub const RED: Rgb = Rgb::new(128, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 128, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 5-6-5 packing used by the SenseHat framebuffer.
    pub fn to_rgb565(self) -> u16 {
        ((self.r as u16 >> 3) << 11) | ((self.g as u16 >> 2) << 5) | (self.b as u16 >> 3)
    }

    /// Inverse of [`Rgb::to_rgb565`], low bits filled with zeros.
    pub fn from_rgb565(v: u16) -> Self {
        Self {
            r: (((v >> 11) & 0x1f) << 3) as u8,
            g: (((v >> 5) & 0x3f) << 2) as u8,
            b: ((v & 0x1f) << 3) as u8,
        }
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self { r, g, b }
    }
}
