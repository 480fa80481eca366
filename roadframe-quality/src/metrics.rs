//! Structural image metrics computed on grayscale frames

use image::GrayImage;

/// Variance of the Laplacian response over the whole image.
///
/// Uses the 4-neighbour kernel
/// ```text
/// [ 0  1  0 ]
/// [ 1 -4  1 ]
/// [ 0  1  0 ]
/// ```
/// with reflect-101 borders. Sharp images carry more high-frequency detail
/// and therefore a higher variance.
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let w = width as i64;
    let h = height as i64;
    let at = |x: i64, y: i64| -> f64 {
        img.get_pixel(reflect101(x, w) as u32, reflect101(y, h) as u32)[0] as f64
    };

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..h {
        for x in 0..w {
            let response =
                at(x, y - 1) + at(x, y + 1) + at(x - 1, y) + at(x + 1, y) - 4.0 * at(x, y);
            sum += response;
            sum_sq += response * response;
        }
    }

    let n = (w * h) as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Root-mean-square deviation of pixel intensity from the mean
pub fn rms_contrast(img: &GrayImage) -> f64 {
    let pixels = img.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }

    let n = pixels.len() as f64;
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / n;
    let variance = pixels
        .iter()
        .map(|&p| (p as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt()
}

/// Shannon entropy, in bits, of the 256-bin intensity histogram
pub fn shannon_entropy(img: &GrayImage) -> f64 {
    let pixels = img.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }

    let mut histogram = [0u64; 256];
    for &p in pixels {
        histogram[p as usize] += 1;
    }

    let n = pixels.len() as f64;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Mirrors an out-of-range index without repeating the edge pixel
fn reflect101(i: i64, n: i64) -> i64 {
    if n == 1 {
        return 0;
    }
    if i < 0 {
        -i
    } else if i >= n {
        2 * n - 2 - i
    } else {
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{imageops, Luma};

    fn checkerboard(size: u32, cell: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Luma([230])
            } else {
                Luma([20])
            }
        })
    }

    #[test]
    fn test_uniform_image_has_no_structure() {
        let img = GrayImage::from_pixel(32, 24, Luma([128]));
        assert_eq!(laplacian_variance(&img), 0.0);
        assert_eq!(rms_contrast(&img), 0.0);
        assert_eq!(shannon_entropy(&img), 0.0);
    }

    #[test]
    fn test_two_level_image() {
        // Left half 0, right half 200
        let img = GrayImage::from_fn(20, 10, |x, _| if x < 10 { Luma([0]) } else { Luma([200]) });
        assert!((shannon_entropy(&img) - 1.0).abs() < 1e-12);
        assert!((rms_contrast(&img) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_of_full_range() {
        let img = GrayImage::from_fn(256, 4, |x, _| Luma([x as u8]));
        assert!((shannon_entropy(&img) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_blur_reduces_laplacian_variance() {
        let sharp = checkerboard(64, 4);
        let blurred = imageops::blur(&sharp, 2.0);

        let sharp_var = laplacian_variance(&sharp);
        let blurred_var = laplacian_variance(&blurred);
        assert!(sharp_var > 0.0);
        assert!(sharp_var > blurred_var);
    }

    #[test]
    fn test_single_pixel_and_empty_images() {
        let one = GrayImage::from_pixel(1, 1, Luma([77]));
        assert_eq!(laplacian_variance(&one), 0.0);
        let empty = GrayImage::new(0, 0);
        assert_eq!(laplacian_variance(&empty), 0.0);
        assert_eq!(rms_contrast(&empty), 0.0);
        assert_eq!(shannon_entropy(&empty), 0.0);
    }

    #[test]
    fn test_reflect101() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(2, 5), 2);
    }
}
