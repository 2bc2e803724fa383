//! Colour tables: the JET heat map and the segmentation label palette

use image::Rgb;

/// JET colour for an 8-bit intensity (blue → cyan → yellow → red)
pub fn jet(value: u8) -> Rgb<u8> {
    let x = value as f32 / 255.0;
    let channel = |offset: f32| {
        let v = (1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Cityscapes label ids for the 19 training ids the segmenters predict
pub const CITYSCAPES_LABEL_IDS: [u8; 19] = [
    7, 8, 11, 12, 13, 17, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 31, 32, 33,
];

/// Training id to Cityscapes label id; ids outside the table pass through
pub fn cityscapes_label_id(train_id: u8) -> u8 {
    CITYSCAPES_LABEL_IDS
        .get(train_id as usize)
        .copied()
        .unwrap_or(train_id)
}

/// 256-entry palette where each label's bits are spread, three at a time, over the
/// high bits of R, G and B
pub fn label_palette() -> [Rgb<u8>; 256] {
    let mut palette = [Rgb([0u8; 3]); 256];
    for (label, entry) in palette.iter_mut().enumerate() {
        let mut lab = label;
        let mut shift = 7i32;
        while lab > 0 && shift >= 0 {
            entry[0] |= ((lab & 1) as u8) << shift;
            entry[1] |= (((lab >> 1) & 1) as u8) << shift;
            entry[2] |= (((lab >> 2) & 1) as u8) << shift;
            shift -= 1;
            lab >>= 3;
        }
    }
    palette
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet(0), Rgb([0, 0, 128]));
        assert_eq!(jet(255), Rgb([128, 0, 0]));
        let mid = jet(128);
        assert!(mid[1] > 200, "middle of the map should be mostly green: {:?}", mid);
    }

    #[test]
    fn test_label_palette() {
        let palette = label_palette();
        assert_eq!(palette[0], Rgb([0, 0, 0]));
        assert_eq!(palette[1], Rgb([128, 0, 0]));
        assert_eq!(palette[2], Rgb([0, 128, 0]));
        assert_eq!(palette[7], Rgb([128, 128, 128]));
        assert_eq!(palette[8], Rgb([64, 0, 0]));
    }

    #[test]
    fn test_cityscapes_label_id() {
        assert_eq!(cityscapes_label_id(0), 7);
        assert_eq!(cityscapes_label_id(18), 33);
        assert_eq!(cityscapes_label_id(200), 200);
    }
}
