use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// A length in PDF points, stored as fixed point and quantized to 1/1000 pt
/// so that identical templates serialize to identical bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn mul_ratio(self, num: i32, denom: i32) -> Pt {
        if denom == 0 {
            return Pt::ZERO;
        }
        let scaled = (self.to_milli_i64() as i128).saturating_mul(num as i128);
        let value = div_round_i128(scaled, denom as i128);
        Pt::from_milli_i64(value.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        let milli = milli as i128;
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }

    pub fn max(self, other: Pt) -> Pt {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Pt) -> Pt {
        if self <= other { self } else { other }
    }
}

fn div_round_i128(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let den_abs = den.abs();
    if num >= 0 {
        (num + (den_abs / 2)) / den
    } else {
        -(((-num) + (den_abs / 2)) / den)
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i64(self.to_milli_i64().saturating_add(rhs.to_milli_i64()))
    }
}

impl std::ops::AddAssign for Pt {
    fn add_assign(&mut self, rhs: Pt) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i64(self.to_milli_i64().saturating_sub(rhs.to_milli_i64()))
    }
}

impl std::ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        if !rhs.is_finite() {
            return Pt::ZERO;
        }
        Pt::from_f32(self.to_f32() * rhs)
    }
}

impl std::ops::Div<f32> for Pt {
    type Output = Pt;
    fn div(self, rhs: f32) -> Pt {
        if rhs == 0.0 || !rhs.is_finite() {
            Pt::ZERO
        } else {
            Pt::from_f32(self.to_f32() / rhs)
        }
    }
}

impl std::iter::Sum for Pt {
    fn sum<I: Iterator<Item = Pt>>(iter: I) -> Pt {
        iter.fold(Pt::ZERO, |acc, v| acc + v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn a4() -> Self {
        Self::from_mm(210.0, 297.0)
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 72pt/in.
        Self {
            width: Pt::from_f32(612.0),
            height: Pt::from_f32(792.0),
        }
    }

    pub fn from_mm(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width: Pt::from_f32(width_mm * 72.0 / 25.4),
            height: Pt::from_f32(height_mm * 72.0 / 25.4),
        }
    }

    pub fn landscape(self) -> Self {
        if self.width >= self.height {
            return self;
        }
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn portrait(self) -> Self {
        if self.height >= self.width {
            return self;
        }
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// User units of a template. Every coordinate in a template is expressed in
/// these; font sizes are always points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Units {
    Pt,
    #[default]
    Mm,
    Cm,
    In,
}

impl Units {
    /// Points per user unit.
    pub fn scale(self) -> f32 {
        match self {
            Units::Pt => 1.0,
            Units::Mm => 72.0 / 25.4,
            Units::Cm => 72.0 / 2.54,
            Units::In => 72.0,
        }
    }

    pub fn to_pt(self, value: f32) -> Pt {
        Pt::from_f32(value * self.scale())
    }

    pub fn from_pt(self, value: Pt) -> f32 {
        value.to_f32() / self.scale()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Units::Pt => "pt",
            Units::Mm => "mm",
            Units::Cm => "cm",
            Units::In => "in",
        }
    }
}

impl TryFrom<String> for Units {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Units::default()),
            "pt" => Ok(Units::Pt),
            "mm" => Ok(Units::Mm),
            "cm" => Ok(Units::Cm),
            "in" => Ok(Units::In),
            other => Err(format!("unknown page units `{other}`")),
        }
    }
}

impl From<Units> for String {
    fn from(value: Units) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl TryFrom<String> for Orientation {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "p" | "portrait" => Ok(Orientation::Portrait),
            "l" | "landscape" => Ok(Orientation::Landscape),
            other => Err(format!("unknown page orientation `{other}`")),
        }
    }
}

impl From<Orientation> for String {
    fn from(value: Orientation) -> Self {
        match value {
            Orientation::Portrait => "P".to_string(),
            Orientation::Landscape => "L".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PageFormat {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PageFormat {
    /// Portrait size of the format.
    pub fn size(self) -> Size {
        match self {
            PageFormat::A3 => Size::from_mm(297.0, 420.0),
            PageFormat::A4 => Size::a4(),
            PageFormat::A5 => Size::from_mm(148.0, 210.0),
            PageFormat::Letter => Size::letter(),
            PageFormat::Legal => Size {
                width: Pt::from_f32(612.0),
                height: Pt::from_f32(1008.0),
            },
        }
    }
}

impl TryFrom<String> for PageFormat {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "" | "A4" => Ok(PageFormat::A4),
            "A3" => Ok(PageFormat::A3),
            "A5" => Ok(PageFormat::A5),
            "LETTER" => Ok(PageFormat::Letter),
            "LEGAL" => Ok(PageFormat::Legal),
            other => Err(format!("unknown page format `{other}`")),
        }
    }
}

impl From<PageFormat> for String {
    fn from(value: PageFormat) -> Self {
        match value {
            PageFormat::A3 => "A3",
            PageFormat::A4 => "A4",
            PageFormat::A5 => "A5",
            PageFormat::Letter => "LETTER",
            PageFormat::Legal => "LEGAL",
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pt_quantizes_to_milli_points() {
        assert_eq!(Pt::from_f32(1.23449).to_milli_i64(), 1234);
        assert_eq!((Pt::from_f32(1.5) + Pt::from_f32(2.25)).to_milli_i64(), 3750);
        assert_eq!(Pt::from_f32(f32::NAN), Pt::ZERO);
    }

    #[test]
    fn millimetres_convert_to_points() {
        let pt = Units::Mm.to_pt(25.4);
        assert_eq!(pt.to_milli_i64(), 72_000);
        assert!((Units::Mm.from_pt(pt) - 25.4).abs() < 0.001);
    }

    #[test]
    fn landscape_swaps_portrait_dimensions() {
        let size = PageFormat::A4.size().landscape();
        assert!(size.width > size.height);
        assert_eq!(size.landscape(), size);
        assert_eq!(size.portrait(), PageFormat::A4.size());
    }

    #[test]
    fn empty_strings_select_defaults() {
        assert_eq!(Units::try_from(String::new()), Ok(Units::Mm));
        assert_eq!(Orientation::try_from(String::new()), Ok(Orientation::Portrait));
        assert_eq!(PageFormat::try_from("letter".to_string()), Ok(PageFormat::Letter));
        assert!(PageFormat::try_from("B7".to_string()).is_err());
    }
}
