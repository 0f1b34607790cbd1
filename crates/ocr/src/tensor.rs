//! PP-OCR 模型输入张量构造

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::{s, Array3, Array4, Axis};

/// 检测模型的输入尺寸限制
pub const DET_LIMIT_SIDE: u32 = 960;
pub const DET_LIMIT_MIN: u32 = 32;

/// 识别模型的输入高度
pub const REC_IMAGE_HEIGHT: u32 = 48;
/// 识别输入的最小宽度；同一批次按最宽的行动态加宽
pub const REC_MIN_WIDTH: u32 = 320;
pub const REC_MAX_WIDTH: u32 = 1600;

/// 裁剪区域边距比例
const CROP_PAD_RATIO: f32 = 0.04;

/// 归一化参数 (x/255 - 0.5) / 0.5
const MEAN: f32 = 0.5;
const STD: f32 = 0.5;

/// 为检测模型准备输入 (1, 3, H, W)，H/W 为 32 的倍数
pub fn prepare_det_input(img: &DynamicImage) -> Array4<f32> {
    let rgb = img.to_rgb8();
    let ratio = det_scale_ratio(rgb.width(), rgb.height());

    let new_w = ((rgb.width() as f32 * ratio) as u32 / 32 * 32).max(DET_LIMIT_MIN);
    let new_h = ((rgb.height() as f32 * ratio) as u32 / 32 * 32).max(DET_LIMIT_MIN);
    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

    to_chw(&resized).insert_axis(Axis(0))
}

/// 按批次准备识别输入
///
/// 每批的宽度由该批中宽高比最大的行决定，窄行右侧以灰色填充。
pub fn prepare_rec_batches(images: &[DynamicImage], batch_size: usize) -> Vec<Array4<f32>> {
    images
        .chunks(batch_size.max(1))
        .map(|chunk| {
            let max_ratio = chunk
                .iter()
                .map(|img| img.width() as f32 / img.height().max(1) as f32)
                .fold(0.0f32, f32::max);
            let batch_w = ((REC_IMAGE_HEIGHT as f32 * max_ratio).ceil() as u32)
                .clamp(REC_MIN_WIDTH, REC_MAX_WIDTH);

            let mut batch = Array4::<f32>::zeros((
                chunk.len(),
                3,
                REC_IMAGE_HEIGHT as usize,
                batch_w as usize,
            ));
            for (i, img) in chunk.iter().enumerate() {
                let line = fit_rec_line(img, batch_w);
                batch.slice_mut(s![i, .., .., ..]).assign(&to_chw(&line));
            }
            batch
        })
        .collect()
}

/// 缩放到识别高度并填充到指定宽度
fn fit_rec_line(img: &DynamicImage, target_w: u32) -> RgbImage {
    let rgb = img.to_rgb8();
    let ratio = REC_IMAGE_HEIGHT as f32 / rgb.height().max(1) as f32;
    let new_w = ((rgb.width() as f32 * ratio).ceil() as u32).clamp(1, target_w);
    let resized = imageops::resize(&rgb, new_w, REC_IMAGE_HEIGHT, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(target_w, REC_IMAGE_HEIGHT, Rgb([127, 127, 127]));
    imageops::overlay(&mut canvas, &resized, 0, 0);
    canvas
}

fn det_scale_ratio(w: u32, h: u32) -> f32 {
    let max_side = w.max(h) as f32;
    let min_side = w.min(h).max(1) as f32;

    let mut ratio = 1.0f32;
    if max_side > DET_LIMIT_SIDE as f32 {
        ratio = DET_LIMIT_SIDE as f32 / max_side;
    }
    if min_side * ratio < DET_LIMIT_MIN as f32 {
        ratio = DET_LIMIT_MIN as f32 / min_side;
    }
    ratio
}

/// RGB 图像转 CHW 张量，通道顺序为 BGR（PP-OCRv5 要求）
fn to_chw(img: &RgbImage) -> Array3<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut tensor = Array3::<f32>::zeros((3, h, w));
    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, channel) in [2usize, 1, 0].into_iter().enumerate() {
            tensor[[c, y, x]] = (pixel[channel] as f32 / 255.0 - MEAN) / STD;
        }
    }
    tensor
}

/// 按四边形外接矩形裁剪文字区域，四周留少量边距
pub fn crop_text_region(img: &DynamicImage, points: &[[f32; 2]; 4]) -> DynamicImage {
    let (min_x, min_y, max_x, max_y) = points.iter().fold(
        (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        |(x0, y0, x1, y1), p| (x0.min(p[0]), y0.min(p[1]), x1.max(p[0]), y1.max(p[1])),
    );

    let pad_x = ((max_x - min_x).max(1.0) * CROP_PAD_RATIO).round();
    let pad_y = ((max_y - min_y).max(1.0) * CROP_PAD_RATIO).round();

    let x0 = (min_x - pad_x).max(0.0) as u32;
    let y0 = (min_y - pad_y).max(0.0) as u32;
    let x1 = ((max_x + pad_x) as u32).min(img.width().saturating_sub(1));
    let y1 = ((max_y + pad_y) as u32).min(img.height().saturating_sub(1));

    img.crop_imm(x0, y0, x1.saturating_sub(x0).max(1), y1.saturating_sub(y0).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_det_input_multiple_of_32() {
        let img = DynamicImage::new_rgb8(1000, 630);
        let input = prepare_det_input(&img);
        let shape = input.shape();
        assert_eq!(&shape[..2], &[1, 3]);
        assert_eq!(shape[2] % 32, 0);
        assert_eq!(shape[3] % 32, 0);
        assert!(shape[3] <= DET_LIMIT_SIDE as usize);
    }

    #[test]
    fn test_rec_batch_width_follows_widest_line() {
        let short = DynamicImage::new_rgb8(96, 48);
        let long = DynamicImage::new_rgb8(960, 48);
        let batches = prepare_rec_batches(&[short.clone(), long], 8);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].shape(), &[2, 3, 48, 960]);

        let batches = prepare_rec_batches(&[short], 8);
        assert_eq!(batches[0].shape(), &[1, 3, 48, REC_MIN_WIDTH as usize]);
    }

    #[test]
    fn test_to_chw_normalizes_bgr() {
        let img = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        let tensor = to_chw(&img);
        assert_eq!(tensor[[0, 0, 0]], -1.0);
        assert_eq!(tensor[[2, 0, 0]], 1.0);
    }

    #[test]
    fn test_crop_stays_inside_image() {
        let img = DynamicImage::new_rgb8(100, 50);
        let points = [[-5.0, -5.0], [120.0, -5.0], [120.0, 60.0], [-5.0, 60.0]];
        let cropped = crop_text_region(&img, &points);
        assert!(cropped.width() <= 100 && cropped.height() <= 50);
    }
}
