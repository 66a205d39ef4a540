// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The small inline byte buffer carried by every [`crate::Signal`].
//!
//! Multi-byte views are reinterpreted in place with `zerocopy`'s
//! [`LayoutVerified`], the same crate (and version) the teacher's IPC API
//! crates use to view a message buffer as a typed struct without copying.
//! The byte order is pinned to little-endian explicitly via
//! `zerocopy::byteorder`, rather than relying on the host's native order.

use byteorder::LittleEndian;
use zerocopy::byteorder::{I16, I32, U16, U32};
use zerocopy::LayoutVerified;

/// A fixed-size, `Copy` byte buffer viewable as any of the scalar types a
/// signal payload conventionally carries. `N` is the inline payload width in
/// bytes (`SIGNAL_PAYLOAD_SIZE`; default 4).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Payload<const N: usize = 4> {
    bytes: [u8; N],
}

impl<const N: usize> Default for Payload<N> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<const N: usize> Payload<N> {
    pub const fn zeroed() -> Self {
        Self { bytes: [0; N] }
    }

    pub const fn raw(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn raw_mut(&mut self) -> &mut [u8; N] {
        &mut self.bytes
    }

    pub fn set_u8(&mut self, v: u8) {
        self.bytes = [0; N];
        self.bytes[0] = v;
    }

    pub fn as_u8(&self) -> u8 {
        self.bytes[0]
    }

    pub fn set_i8(&mut self, v: i8) {
        self.set_u8(v as u8);
    }

    pub fn as_i8(&self) -> i8 {
        self.as_u8() as i8
    }

    pub fn set_u16(&mut self, v: u16) {
        self.bytes = [0; N];
        LayoutVerified::<_, U16<LittleEndian>>::new(&mut self.bytes[..2])
            .unwrap()
            .into_mut()
            .set(v);
    }

    pub fn as_u16(&self) -> u16 {
        LayoutVerified::<_, U16<LittleEndian>>::new(&self.bytes[..2])
            .unwrap()
            .into_ref()
            .get()
    }

    pub fn set_i16(&mut self, v: i16) {
        self.bytes = [0; N];
        LayoutVerified::<_, I16<LittleEndian>>::new(&mut self.bytes[..2])
            .unwrap()
            .into_mut()
            .set(v);
    }

    pub fn as_i16(&self) -> i16 {
        LayoutVerified::<_, I16<LittleEndian>>::new(&self.bytes[..2])
            .unwrap()
            .into_ref()
            .get()
    }

    pub fn set_u32(&mut self, v: u32) {
        self.bytes = [0; N];
        LayoutVerified::<_, U32<LittleEndian>>::new(&mut self.bytes[..4])
            .unwrap()
            .into_mut()
            .set(v);
    }

    pub fn as_u32(&self) -> u32 {
        LayoutVerified::<_, U32<LittleEndian>>::new(&self.bytes[..4])
            .unwrap()
            .into_ref()
            .get()
    }

    pub fn set_i32(&mut self, v: i32) {
        self.bytes = [0; N];
        LayoutVerified::<_, I32<LittleEndian>>::new(&mut self.bytes[..4])
            .unwrap()
            .into_mut()
            .set(v);
    }

    pub fn as_i32(&self) -> i32 {
        LayoutVerified::<_, I32<LittleEndian>>::new(&self.bytes[..4])
            .unwrap()
            .into_ref()
            .get()
    }

    pub fn set_f32(&mut self, v: f32) {
        self.set_u32(v.to_bits());
    }

    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.as_u32())
    }
}
