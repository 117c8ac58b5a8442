// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Lagrange cubic interpolation over a monotone X table whose Y values are
//! multiples of a fixed stride.

/// Interpolates `y(x)` where `y(x_arr[i]) = i * y_stride`.
///
/// `x` must lie in `[x_arr[0], x_arr[len - 1]]` and the table must hold at
/// least four strictly increasing points.
pub(crate) fn using_x_arr_and_y_stride(x_arr: &[f64], y_stride: f64, x: f64) -> f64 {
    let len = x_arr.len();
    debug_assert!(len >= 4);

    let last = len - 1;
    debug_assert!(x >= x_arr[0] && x <= x_arr[last]);

    if x == x_arr[last] {
        return y_stride * last as f64;
    }

    // Pick the 4-point window around the straddling interval, clamped at both
    // ends of the table.
    let straddle = find_straddle(x_arr, x);
    let start = straddle.saturating_sub(1).min(len - 4);

    let xs = [
        x_arr[start],
        x_arr[start + 1],
        x_arr[start + 2],
        x_arr[start + 3],
    ];
    let ys = [
        y_stride * start as f64,
        y_stride * (start + 1) as f64,
        y_stride * (start + 2) as f64,
        y_stride * (start + 3) as f64,
    ];
    cubic_interpolate(&xs, &ys, x)
}

fn cubic_interpolate(xs: &[f64; 4], ys: &[f64; 4], x: f64) -> f64 {
    let mut result = 0.0;
    for i in 0..4 {
        let mut basis = 1.0;
        for j in 0..4 {
            if i != j {
                basis *= (x - xs[j]) / (xs[i] - xs[j]);
            }
        }
        result += ys[i] * basis;
    }
    result
}

/// Index `i` such that `x_arr[i] <= x < x_arr[i + 1]`.
fn find_straddle(x_arr: &[f64], x: f64) -> usize {
    debug_assert!(x_arr.len() >= 2);
    let upper = x_arr.partition_point(|&v| v <= x);
    upper.clamp(1, x_arr.len() - 1) - 1
}
