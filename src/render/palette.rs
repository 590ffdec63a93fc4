use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{anyhow, Error, Result};

/// Named 256-entry colour lookup tables.
///
/// Each table is built from piecewise-linear RGB control points in the
/// familiar shapes of the classic colormaps of the same names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Palette {
    Autumn,
    Bone,
    Jet,
    Winter,
    Rainbow,
    Ocean,
    Summer,
    Spring,
    Cool,
    Hsv,
    Pink,
    Hot,
}

pub type Lut = [[u8; 3]; 256];

type Channel = &'static [(f32, f32)];

impl Palette {
    pub const ALL: [Palette; 12] = [
        Palette::Autumn,
        Palette::Bone,
        Palette::Jet,
        Palette::Winter,
        Palette::Rainbow,
        Palette::Ocean,
        Palette::Summer,
        Palette::Spring,
        Palette::Cool,
        Palette::Hsv,
        Palette::Pink,
        Palette::Hot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Palette::Autumn => "Autumn",
            Palette::Bone => "Bone",
            Palette::Jet => "Jet",
            Palette::Winter => "Winter",
            Palette::Rainbow => "Rainbow",
            Palette::Ocean => "Ocean",
            Palette::Summer => "Summer",
            Palette::Spring => "Spring",
            Palette::Cool => "Cool",
            Palette::Hsv => "HSV",
            Palette::Pink => "Pink",
            Palette::Hot => "Hot",
        }
    }

    /// Colour for an 8-bit intensity.
    #[inline]
    pub fn color(&self, value: u8) -> [u8; 3] {
        self.lut()[value as usize]
    }

    pub fn lut(&self) -> &'static Lut {
        static LUTS: OnceLock<Vec<Lut>> = OnceLock::new();
        let luts = LUTS.get_or_init(|| Palette::ALL.iter().map(|p| p.build_lut()).collect());
        &luts[*self as usize]
    }

    fn build_lut(&self) -> Lut {
        let (r, g, b) = self.control_points();
        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            let t = i as f32 / 255.0;
            *entry = [interpolate(r, t), interpolate(g, t), interpolate(b, t)];
        }
        lut
    }

    fn control_points(&self) -> (Channel, Channel, Channel) {
        match self {
            Palette::Autumn => (&[(0.0, 1.0), (1.0, 1.0)], &[(0.0, 0.0), (1.0, 1.0)], &[(0.0, 0.0), (1.0, 0.0)]),
            Palette::Bone => (
                &[(0.0, 0.0), (0.746, 0.652), (1.0, 1.0)],
                &[(0.0, 0.0), (0.365, 0.319), (0.746, 0.777), (1.0, 1.0)],
                &[(0.0, 0.0), (0.365, 0.444), (1.0, 1.0)],
            ),
            Palette::Jet => (
                &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)],
                &[(0.0, 0.0), (0.125, 0.0), (0.375, 1.0), (0.64, 1.0), (0.91, 0.0), (1.0, 0.0)],
                &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)],
            ),
            Palette::Winter => (&[(0.0, 0.0), (1.0, 0.0)], &[(0.0, 0.0), (1.0, 1.0)], &[(0.0, 1.0), (1.0, 0.5)]),
            Palette::Rainbow => (
                &[(0.0, 1.0), (0.2, 1.0), (0.4, 0.0), (0.8, 0.0), (1.0, 0.5)],
                &[(0.0, 0.0), (0.2, 1.0), (0.6, 1.0), (0.8, 0.0), (1.0, 0.0)],
                &[(0.0, 0.0), (0.4, 0.0), (0.6, 1.0), (1.0, 1.0)],
            ),
            Palette::Ocean => (
                &[(0.0, 0.0), (0.667, 0.0), (1.0, 1.0)],
                &[(0.0, 0.5), (0.333, 0.0), (1.0, 1.0)],
                &[(0.0, 0.0), (1.0, 1.0)],
            ),
            Palette::Summer => (&[(0.0, 0.0), (1.0, 1.0)], &[(0.0, 0.5), (1.0, 1.0)], &[(0.0, 0.4), (1.0, 0.4)]),
            Palette::Spring => (&[(0.0, 1.0), (1.0, 1.0)], &[(0.0, 0.0), (1.0, 1.0)], &[(0.0, 1.0), (1.0, 0.0)]),
            Palette::Cool => (&[(0.0, 0.0), (1.0, 1.0)], &[(0.0, 1.0), (1.0, 0.0)], &[(0.0, 1.0), (1.0, 1.0)]),
            Palette::Hsv => (
                &[(0.0, 1.0), (0.167, 1.0), (0.333, 0.0), (0.667, 0.0), (0.833, 1.0), (1.0, 1.0)],
                &[(0.0, 0.0), (0.167, 1.0), (0.5, 1.0), (0.667, 0.0), (1.0, 0.0)],
                &[(0.0, 0.0), (0.333, 0.0), (0.5, 1.0), (0.833, 1.0), (1.0, 0.0)],
            ),
            Palette::Pink => (
                &[(0.0, 0.118), (0.365, 0.745), (1.0, 1.0)],
                &[(0.0, 0.0), (0.365, 0.516), (0.746, 0.858), (1.0, 1.0)],
                &[(0.0, 0.0), (0.746, 0.746), (1.0, 1.0)],
            ),
            Palette::Hot => (
                &[(0.0, 0.0), (0.365, 1.0), (1.0, 1.0)],
                &[(0.0, 0.0), (0.365, 0.0), (0.746, 1.0), (1.0, 1.0)],
                &[(0.0, 0.0), (0.746, 0.0), (1.0, 1.0)],
            ),
        }
    }
}

fn interpolate(points: Channel, t: f32) -> u8 {
    let mut value = points.last().map(|&(_, v)| v).unwrap_or(0.0);
    for pair in points.windows(2) {
        let ((t0, v0), (t1, v1)) = (pair[0], pair[1]);
        if t <= t1 {
            let span = (t1 - t0).max(f32::EPSILON);
            value = v0 + (v1 - v0) * ((t - t0) / span).clamp(0.0, 1.0);
            break;
        }
    }
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Palette::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Palette::ALL.iter().map(|p| p.name()).collect();
                anyhow!("unknown palette '{}' (known: {})", wanted, known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() -> Result<()> {
        assert_eq!("Jet".parse::<Palette>()?, Palette::Jet);
        assert_eq!("hsv".parse::<Palette>()?, Palette::Hsv);
        assert_eq!(" HOT ".parse::<Palette>()?, Palette::Hot);
        Ok(())
    }

    #[test]
    fn unknown_palette_is_an_error() {
        let err = "Magma".parse::<Palette>().expect_err("Magma is not a palette");
        assert!(err.to_string().contains("unknown palette"));
    }

    #[test]
    fn jet_runs_blue_to_red() {
        let jet = Palette::Jet;
        assert_eq!(jet.color(0), [0, 0, 128]);
        let top = jet.color(255);
        assert_eq!(top, [128, 0, 0]);
        let mid = jet.color(128);
        assert!(mid[1] > 200, "jet midpoint should be green-ish, got {:?}", mid);
    }

    #[test]
    fn grey_like_palettes_are_monotonic() {
        for palette in [Palette::Bone, Palette::Hot, Palette::Pink] {
            let lut = palette.lut();
            for pair in lut.windows(2) {
                let a: u32 = pair[0].iter().map(|&c| c as u32).sum();
                let b: u32 = pair[1].iter().map(|&c| c as u32).sum();
                assert!(b >= a, "{palette} is not monotonic");
            }
        }
    }

    #[test]
    fn every_palette_round_trips_its_name() -> Result<()> {
        for palette in Palette::ALL {
            assert_eq!(palette.name().parse::<Palette>()?, palette);
        }
        Ok(())
    }
}
