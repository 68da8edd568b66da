// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Primality and endianness helpers

use crate::error::{MeterError, Result};

/// Whether `n` is prime. `n` must be positive.
pub fn is_prime(n: usize) -> Result<bool> {
    if n == 0 {
        return Err(MeterError::BadArgument(
            "primality is only defined for positive numbers".into(),
        ));
    }
    if n % 2 == 0 {
        return Ok(n == 2);
    }
    let mut i = 3usize;
    while i * i <= n {
        if n % i == 0 {
            return Ok(false);
        }
        i += 2;
    }
    Ok(n != 1)
}

/// The smallest prime `>= n`. `n` must be positive.
pub fn next_prime(mut n: usize) -> Result<usize> {
    while !is_prime(n)? {
        n += 1;
    }
    Ok(n)
}

/// Convert a 2-byte word between network and host representation.
pub fn net_to_host16(val: u16) -> u16 {
    if cfg!(target_endian = "big") {
        val.swap_bytes()
    } else {
        val
    }
}

/// Convert a 4-byte word between network and host representation.
pub fn net_to_host32(val: u32) -> u32 {
    if cfg!(target_endian = "big") {
        val.swap_bytes()
    } else {
        val
    }
}
