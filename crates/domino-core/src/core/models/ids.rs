use slotmap::{Key, KeyData, new_key_type};

new_key_type! {
    pub struct EntityId;
}

impl EntityId {
    /// Stable 64-bit encoding used by the on-disk record header.
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    pub fn from_raw(raw: u64) -> Self {
        KeyData::from_ffi(raw).into()
    }
}
