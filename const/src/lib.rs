//! Identifiers of Bluetooth controller vendors.

#![warn(missing_debug_implementations)]
#![warn(non_ascii_idents)]
#![warn(single_use_lifetimes)]
#![warn(unused_crate_dependencies)]
#![warn(unused_extern_crates)]
#![warn(unused_import_braces)]
#![warn(unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(variant_size_differences)]
#![warn(clippy::cargo)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
// #![warn(clippy::restriction)]
#![warn(clippy::assertions_on_result_states)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::decimal_literal_representation)]
#![warn(clippy::default_union_representation)]
#![warn(clippy::deref_by_slicing)]
#![warn(clippy::empty_drop)]
#![warn(clippy::empty_structs_with_brackets)]
#![warn(clippy::exhaustive_enums)]
#![warn(clippy::exit)]
#![warn(clippy::fn_to_numeric_cast_any)]
#![warn(clippy::format_push_string)]
#![warn(clippy::get_unwrap)]
#![warn(clippy::if_then_some_else_none)]
#![warn(clippy::lossy_float_literal)]
#![warn(clippy::missing_enforced_import_renames)]
#![warn(clippy::mixed_read_write_in_expression)]
#![warn(clippy::mod_module_files)]
#![warn(clippy::mutex_atomic)]
#![warn(clippy::pattern_type_mismatch)]
#![warn(clippy::print_stdout)]
#![warn(clippy::rc_buffer)]
#![warn(clippy::rc_mutex)]
#![warn(clippy::rest_pat_in_fully_bound_structs)]
//#![warn(clippy::semicolon_outside_block)]
#![warn(clippy::str_to_string)]
#![warn(clippy::string_add)]
#![warn(clippy::string_to_string)]
#![warn(clippy::suspicious_xor_used_as_pow)]
#![warn(clippy::todo)]
#![warn(clippy::try_err)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(clippy::unnecessary_safety_comment)]
#![warn(clippy::unnecessary_safety_doc)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::unneeded_field_pattern)]
#![warn(clippy::unseparated_literal_suffix)]

use std::fmt::{Debug, Display, Formatter};

/// Company identifier reported by `HCI_Read_Local_Version_Information`
/// ([Assigned Numbers] Section 7.1).
#[derive(Clone, Copy, Default, Eq, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct CompanyId(pub u16);

impl CompanyId {
    pub const INTEL: Self = Self(0x0002);
    pub const QUALCOMM_CSR: Self = Self(0x000A);
    pub const BROADCOM: Self = Self(0x000F);
    pub const QUALCOMM: Self = Self(0x001D);
    pub const ATHEROS: Self = Self(0x0045);
    pub const APPLE: Self = Self(0x004C);
    pub const REALTEK: Self = Self(0x005D);

    /// Returns the raw company ID.
    #[inline(always)]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns the associated company name or [`None`] if the identifier is
    /// not a known controller vendor.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0x0002 => "Intel Corp.",
            0x000A => "Qualcomm Technologies International, Ltd. (QTIL)",
            0x000F => "Broadcom Corporation",
            0x001D => "Qualcomm",
            0x0045 => "Atheros Communications, Inc.",
            0x004C => "Apple, Inc.",
            0x005D => "Realtek Semiconductor Corporation",
            _ => return None,
        })
    }
}

impl Debug for CompanyId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = self.name().unwrap_or("<unknown>");
        f.debug_tuple("CompanyId")
            .field(&format_args!("{:#06X} => \"{name}\"", self.0))
            .finish()
    }
}

impl Display for CompanyId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name().unwrap_or("<unknown>"))
    }
}

impl From<u16> for CompanyId {
    #[inline(always)]
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl From<CompanyId> for u16 {
    #[inline(always)]
    fn from(id: CompanyId) -> Self {
        id.raw()
    }
}

/// USB vendor IDs of Bluetooth controller and module manufacturers.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u16)]
pub enum UsbVendor {
    Foxconn = 0x0489,
    LiteOn = 0x04CA,
    Apple = 0x05AC,
    Broadcom = 0x0A5C,
    Realtek = 0x0BDA,
    Atheros = 0x0CF3,
    Azurewave = 0x13D3,
    Dell = 0x413C,
    Intel = 0x8087,
}

impl UsbVendor {
    /// Returns the vendor for USB vendor ID `vid` or [`None`] if the vendor is
    /// not known.
    #[inline]
    #[must_use]
    pub fn from_vid(vid: u16) -> Option<Self> {
        Self::try_from(vid).ok()
    }

    /// Returns the raw USB vendor ID.
    #[inline(always)]
    #[must_use]
    pub fn vid(self) -> u16 {
        u16::from(self)
    }
}

impl Display for UsbVendor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} ({:#06X})", self.vid())
    }
}
