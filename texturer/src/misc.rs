// Small geometric and raster helpers shared by the texturing stages.

use std::cmp::Ordering;
use std::ops::Sub;

use image::{Rgb, RgbImage};

use crate::{Matrix2, Vector2, Vector3};

pub fn ordered(e: [usize; 2]) -> [usize; 2] {
    if e[0] < e[1] {
        e
    } else {
        [e[1], e[0]]
    }
}

pub fn all_nonneg(v: Vector3) -> bool {
    v.iter().all(|&c| c >= 0.0)
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Rectangle<T> {
    pub pos: [T; 2],
    pub size: [T; 2],
}

type Comparator<T> = fn(&T, &T) -> Ordering;

pub fn extremum<
    T: Copy + PartialOrd + Sub<Output = T>,
    I: Iterator<Item = T>,
>(
    it: I,
    f: fn(I, Comparator<T>) -> Option<T>,
) -> T {
    f(it, |p, q| p.partial_cmp(q).unwrap()).unwrap()
}

impl<T> Rectangle<T> {
    pub fn bounding(xys: &[[T; 2]]) -> Rectangle<T>
    where
        T: Copy + PartialOrd + Sub<Output = T>,
    {
        let xys_coord = |k: usize| xys.iter().map(move |xy| xy[k]);

        let xmin = extremum(xys_coord(0), Iterator::min_by);
        let xmax = extremum(xys_coord(0), Iterator::max_by);
        let ymin = extremum(xys_coord(1), Iterator::min_by);
        let ymax = extremum(xys_coord(1), Iterator::max_by);

        Rectangle {
            pos: [xmin, ymin],
            size: [xmax - xmin, ymax - ymin],
        }
    }
}

pub struct BarycentricCoordinateSystem {
    vs: [Vector2; 3],
    n22: nalgebra::QR<f64, nalgebra::U2, nalgebra::U2>,
}

impl BarycentricCoordinateSystem {
    pub fn new(vs: [Vector2; 3]) -> Option<Self> {
        let m22 = Matrix2::from_columns(&[vs[1] - vs[0], vs[2] - vs[0]]);
        let n22 = m22.qr();
        if n22.is_invertible() {
            Some(Self { vs, n22 })
        } else {
            None // The triangle is degenerate.
        }
    }

    // The functions 'infer' and 'apply' are mutually inverse.

    pub fn infer(&self, v: Vector2) -> Vector3 {
        let &[l1, l2] = self.n22.solve(&(v - self.vs[0])).unwrap().as_ref();
        Vector3::new(1.0 - l1 - l2, l1, l2)
    }

    // Assuming the input 'u' sums to 1.0.
    pub fn apply(&self, u: Vector3) -> Vector2 {
        u[0] * self.vs[0] + u[1] * self.vs[1] + u[2] * self.vs[2]
    }
}

pub fn get_pixel_as_vector3(x: u32, y: u32, image: &RgbImage) -> Vector3 {
    let p = image.get_pixel(x, y);
    Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64)
}

pub fn set_pixel_as_vector3(
    x: u32,
    y: u32,
    color: Vector3,
    image: &mut RgbImage,
) {
    let [r, g, b] = color.as_ref();
    let r1 = r.clamp(0.0, 255.0).round() as u8;
    let g1 = g.clamp(0.0, 255.0).round() as u8;
    let b1 = b.clamp(0.0, 255.0).round() as u8;
    image.put_pixel(x, y, Rgb([r1, g1, b1]));
}

/// Bilinear sample at pixel coordinates (x right, y down).
pub fn sample_pixel(xy: Vector2, image: &RgbImage) -> Vector3 {
    let (w, h) = image.dimensions();
    let x = xy[0].clamp(0.0, (w - 1) as f64);
    let y = xy[1].clamp(0.0, (h - 1) as f64);
    let (x0, x1) = (x as u32, (x as u32 + 1).min(w - 1));
    let (y0, y1) = (y as u32, (y as u32 + 1).min(h - 1));
    let (dx, dy) = (x - x0 as f64, y - y0 as f64);
    let s00 = get_pixel_as_vector3(x0, y0, image);
    let s10 = get_pixel_as_vector3(x1, y0, image);
    let s01 = get_pixel_as_vector3(x0, y1, image);
    let s11 = get_pixel_as_vector3(x1, y1, image);
    let s0 = (1.0 - dx) * s00 + dx * s10;
    let s1 = (1.0 - dx) * s01 + dx * s11;
    (1.0 - dy) * s0 + dy * s1
}
