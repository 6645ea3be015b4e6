// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 透视变换: 画面像素坐标 → 球场坐标
//!
//! 归一化 DLT 求解单应性矩阵, 最小二乘意义下使用全部对应点

use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};

use crate::detection::Point;
use crate::error::{Error, Result};

/// 求解单应性所需的最少对应点数
pub const MIN_CORRESPONDENCES: usize = 4;

#[derive(Clone, Debug)]
pub struct ViewTransformer {
    m: Matrix3<f64>,
}

impl ViewTransformer {
    /// 由对应点求解单应性矩阵
    pub fn new(source: &[Point], target: &[Point]) -> Result<Self> {
        if source.len() != target.len() {
            return Err(Error::InvalidParameter(format!(
                "source and target must have the same length ({} != {})",
                source.len(),
                target.len()
            )));
        }
        if source.len() < MIN_CORRESPONDENCES {
            return Err(Error::InsufficientKeypoints {
                found: source.len(),
            });
        }

        let (src, t_src) = normalize(source)?;
        let (dst, t_dst) = normalize(target)?;

        let n = src.len();
        let mut a = DMatrix::<f64>::zeros(2 * n, 9);
        for (i, ((x, y), (u, v))) in src.iter().zip(&dst).enumerate() {
            let r = 2 * i;
            a[(r, 0)] = -x;
            a[(r, 1)] = -y;
            a[(r, 2)] = -1.0;
            a[(r, 6)] = u * x;
            a[(r, 7)] = u * y;
            a[(r, 8)] = *u;
            a[(r + 1, 3)] = -x;
            a[(r + 1, 4)] = -y;
            a[(r + 1, 5)] = -1.0;
            a[(r + 1, 6)] = v * x;
            a[(r + 1, 7)] = v * y;
            a[(r + 1, 8)] = *v;
        }

        // AᵀA 最小特征值对应的特征向量即为解
        let ata = a.transpose() * &a;
        let eigen = SymmetricEigen::new(ata);
        let mut order: Vec<usize> = (0..9).collect();
        order.sort_by(|&i, &j| eigen.eigenvalues[i].total_cmp(&eigen.eigenvalues[j]));

        // 次小特征值也接近 0 说明点集共线或重合, 解不唯一
        let largest = eigen.eigenvalues[order[8]].abs().max(f64::EPSILON);
        if eigen.eigenvalues[order[1]].abs() <= largest * 1e-12 {
            return Err(Error::DegenerateHomography);
        }

        let h = eigen.eigenvectors.column(order[0]);
        let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

        let t_dst_inv = t_dst.try_inverse().ok_or(Error::DegenerateHomography)?;
        let mut m = t_dst_inv * hn * t_src;
        let scale = m[(2, 2)];
        if scale.abs() > f64::EPSILON {
            m /= scale;
        }

        if !m.iter().all(|v| v.is_finite()) || m.determinant().abs() < 1e-12 {
            return Err(Error::DegenerateHomography);
        }

        Ok(Self { m })
    }

    /// 变换一组点, 空输入返回空
    ///
    /// 落在地平线上 (w≈0) 或结果非有限的点无法投影, 跳过并记录警告
    pub fn transform_points(&self, points: &[Point]) -> Vec<Point> {
        let mut projected = Vec::with_capacity(points.len());
        for p in points {
            let v = self.m * Vector3::new(p.x as f64, p.y as f64, 1.0);
            let (x, y) = (v.x / v.z, v.y / v.z);
            if v.z.abs() < 1e-12 || !x.is_finite() || !y.is_finite() {
                log::warn!("⚠️ 无法投影 ({:.1}, {:.1}), 已跳过", p.x, p.y);
                continue;
            }
            projected.push(Point::new(x as f32, y as f32));
        }
        projected
    }
}

/// Hartley 归一化: 平移到质心, 平均距离缩放为 √2
fn normalize(points: &[Point]) -> Result<(Vec<(f64, f64)>, Matrix3<f64>)> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y as f64).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist < 1e-9 {
        return Err(Error::DegenerateHomography);
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = points
        .iter()
        .map(|p| ((p.x as f64 - cx) * s, (p.y as f64 - cy) * s))
        .collect();
    Ok((normalized, t))
}
