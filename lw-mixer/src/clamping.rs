//! Saturating mix kernel with AVX SIMD
//!
//! Sums a source buffer into the output bus and hard-clips the result to
//! [-1.0, 1.0]. A NaN sum is written as silence. The AVX path handles
//! 8 samples per iteration and matches the scalar path exactly.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[inline]
fn saturate(val: f32) -> f32 {
    if val.is_nan() {
        0.0
    } else {
        val.clamp(-1.0, 1.0)
    }
}

/// Mix `src` into `dst` with AVX SIMD
///
/// # Safety
/// Requires AVX CPU support.
#[target_feature(enable = "avx")]
#[cfg(target_arch = "x86_64")]
pub unsafe fn mix_into_avx(dst: &mut [f32], src: &[f32]) {
    let min_val = _mm256_set1_ps(-1.0);
    let max_val = _mm256_set1_ps(1.0);

    let len = dst.len().min(src.len());
    let mut i = 0;

    while i + 8 <= len {
        let a = _mm256_loadu_ps(dst.as_ptr().add(i));
        let b = _mm256_loadu_ps(src.as_ptr().add(i));
        let mut val = _mm256_add_ps(a, b);

        // NaN lanes compare false and are masked to 0.0
        let nan_mask = _mm256_cmp_ps(val, val, _CMP_EQ_OQ);
        val = _mm256_and_ps(val, nan_mask);

        val = _mm256_min_ps(val, max_val);
        val = _mm256_max_ps(val, min_val);

        _mm256_storeu_ps(dst.as_mut_ptr().add(i), val);
        i += 8;
    }

    while i < len {
        dst[i] = saturate(dst[i] + src[i]);
        i += 1;
    }
}

/// Portable mix path
pub fn mix_into_scalar(dst: &mut [f32], src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d = saturate(*d + *s);
    }
}

/// Mix `src` into `dst`: `dst[i] = clamp(dst[i] + src[i], -1, 1)`
///
/// Only the common prefix of the two slices is touched.
pub fn mix_into(dst: &mut [f32], src: &[f32]) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx") {
            unsafe {
                mix_into_avx(dst, src);
            }
            return;
        }
    }

    mix_into_scalar(dst, src);
}
