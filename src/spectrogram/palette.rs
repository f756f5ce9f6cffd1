// src/spectrogram/palette.rs
//! 256-entry colour tables mapping colour indices to RGB.

use clap::ValueEnum;
use image::Rgb;

/// The built-in colour maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColourMap {
    #[default]
    WhitePurple,
    InverseGreyscale,
    HotMetal,
    BlueGreenRed,
    Greys,
    YellowOrangeRed,
    PurpleOrange,
}

impl ColourMap {
    pub const ALL: [ColourMap; 7] = [
        ColourMap::WhitePurple,
        ColourMap::InverseGreyscale,
        ColourMap::HotMetal,
        ColourMap::BlueGreenRed,
        ColourMap::Greys,
        ColourMap::YellowOrangeRed,
        ColourMap::PurpleOrange,
    ];

    /// The map after this one, wrapping around at the end.
    pub fn next(self) -> Self {
        let position = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(position + 1) % Self::ALL.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            ColourMap::WhitePurple => "white-purple",
            ColourMap::InverseGreyscale => "inverse-greyscale",
            ColourMap::HotMetal => "hot-metal",
            ColourMap::BlueGreenRed => "blue-green-red",
            ColourMap::Greys => "greys",
            ColourMap::YellowOrangeRed => "yellow-orange-red",
            ColourMap::PurpleOrange => "purple-orange",
        }
    }

    /// Colour stops from quietest (index 0) to loudest (index 255).
    fn stops(self) -> &'static [[u8; 3]] {
        match self {
            ColourMap::WhitePurple => &[
                [255, 255, 255],
                [232, 220, 240],
                [190, 160, 220],
                [140, 80, 190],
                [90, 20, 140],
                [45, 0, 75],
            ],
            ColourMap::InverseGreyscale => &[[255, 255, 255], [0, 0, 0]],
            ColourMap::HotMetal => &[
                [0, 0, 0],
                [128, 0, 0],
                [230, 40, 0],
                [255, 160, 0],
                [255, 240, 80],
                [255, 255, 255],
            ],
            ColourMap::BlueGreenRed => &[
                [0, 0, 96],
                [0, 64, 255],
                [0, 200, 120],
                [120, 230, 0],
                [255, 200, 0],
                [255, 0, 0],
            ],
            ColourMap::Greys => &[
                [255, 255, 255],
                [240, 240, 240],
                [217, 217, 217],
                [189, 189, 189],
                [150, 150, 150],
                [115, 115, 115],
                [82, 82, 82],
                [37, 37, 37],
                [0, 0, 0],
            ],
            ColourMap::YellowOrangeRed => &[
                [255, 255, 204],
                [255, 237, 160],
                [254, 217, 118],
                [254, 178, 76],
                [253, 141, 60],
                [252, 78, 42],
                [227, 26, 28],
                [189, 0, 38],
                [128, 0, 38],
            ],
            ColourMap::PurpleOrange => &[
                [45, 0, 75],
                [84, 39, 136],
                [128, 115, 172],
                [178, 171, 210],
                [216, 218, 235],
                [247, 247, 247],
                [254, 224, 182],
                [253, 184, 99],
                [224, 130, 20],
                [179, 88, 6],
                [127, 59, 8],
            ],
        }
    }
}

/// Lookup table from colour index to presentation colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    colours: [Rgb<u8>; 256],
}

impl Palette {
    pub fn new(map: ColourMap) -> Self {
        Self::from_stops(map.stops())
    }

    /// Build a table by linear interpolation between evenly spaced stops.
    fn from_stops(stops: &[[u8; 3]]) -> Self {
        let mut colours = [Rgb([0, 0, 0]); 256];
        let segments = (stops.len() - 1) as f32;

        for (index, colour) in colours.iter_mut().enumerate() {
            let position = index as f32 / 255.0 * segments;
            let lower = (position.floor() as usize).min(stops.len() - 2);
            let t = position - lower as f32;
            let (a, b) = (stops[lower], stops[lower + 1]);
            let mix = |c: usize| (a[c] as f32 + (b[c] as f32 - a[c] as f32) * t).round() as u8;
            *colour = Rgb([mix(0), mix(1), mix(2)]);
        }

        Self { colours }
    }

    pub fn colour(&self, index: u8) -> Rgb<u8> {
        self.colours[index as usize]
    }
}

impl From<ColourMap> for Palette {
    fn from(map: ColourMap) -> Self {
        Palette::new(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_match_first_and_last_stop() {
        for map in ColourMap::ALL {
            let palette = Palette::new(map);
            let stops = map.stops();
            assert_eq!(palette.colour(0).0, stops[0], "{}", map.name());
            assert_eq!(palette.colour(255).0, stops[stops.len() - 1], "{}", map.name());
        }
    }

    #[test]
    fn test_greyscale_is_monotonic() {
        let palette = Palette::new(ColourMap::InverseGreyscale);
        for index in 1..=255u8 {
            assert!(palette.colour(index).0[0] <= palette.colour(index - 1).0[0]);
        }
    }

    #[test]
    fn test_cycling_visits_every_map() {
        let mut map = ColourMap::default();
        let mut seen = Vec::new();
        for _ in 0..ColourMap::ALL.len() {
            seen.push(map);
            map = map.next();
        }
        assert_eq!(map, ColourMap::default());
        assert_eq!(seen, ColourMap::ALL);
    }
}
