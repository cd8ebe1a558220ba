#![allow(clippy::use_self)]

use std::fmt::{Display, Formatter};

use OpcodeGroup::*;

use super::Opcode;

/// Opcode group field values ([Vol 4] Part E, Section 7).
#[derive(
    Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u16)]
pub enum OpcodeGroup {
    LinkControl = 0x01,
    LinkPolicy = 0x02,
    HciControl = 0x03,
    InfoParams = 0x04,
    StatusParams = 0x05,
    Testing = 0x06,
    Le = 0x08,
    Vendor = 0x3F, // [Vol 4] Part E, Section 5.4.1
}

macro_rules! opcodes {
    ($($name:ident = ($ogf:expr, $ocf:literal),)+) => {
        impl Opcode {
            $(pub const $name: Self = Self::new($ogf as u16, $ocf);)+

            /// Returns the opcode name or `None` if the opcode is not known.
            #[must_use]
            pub const fn name(self) -> Option<&'static str> {
                match self {
                    $(Self::$name => Some(stringify!($name)),)+
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    // Used to update `Num_HCI_Command_Packets` ([Vol 4] Part E, Section 7.7.14)
    NONE = (0, 0x000),

    // Link Control commands ([Vol 4] Part E, Section 7.1)
    INQUIRY = (LinkControl, 0x001),
    INQUIRY_CANCEL = (LinkControl, 0x002),
    PERIODIC_INQUIRY = (LinkControl, 0x003),
    EXIT_PERIODIC_INQUIRY = (LinkControl, 0x004),
    CREATE_CONNECTION = (LinkControl, 0x005),
    DISCONNECT = (LinkControl, 0x006),
    ADD_SCO_CONNECTION = (LinkControl, 0x007),
    CREATE_CONNECTION_CANCEL = (LinkControl, 0x008),
    ACCEPT_CONNECTION_REQUEST = (LinkControl, 0x009),
    REJECT_CONNECTION_REQUEST = (LinkControl, 0x00A),
    LINK_KEY_REQUEST_REPLY = (LinkControl, 0x00B),
    LINK_KEY_REQUEST_NEGATIVE_REPLY = (LinkControl, 0x00C),
    PIN_CODE_REQUEST_REPLY = (LinkControl, 0x00D),
    PIN_CODE_REQUEST_NEGATIVE_REPLY = (LinkControl, 0x00E),
    CHANGE_CONNECTION_PACKET_TYPE = (LinkControl, 0x00F),
    AUTHENTICATION_REQUESTED = (LinkControl, 0x011),
    SET_CONNECTION_ENCRYPTION = (LinkControl, 0x013),
    CHANGE_CONNECTION_LINK_KEY = (LinkControl, 0x015),
    REMOTE_NAME_REQUEST = (LinkControl, 0x019),
    REMOTE_NAME_REQUEST_CANCEL = (LinkControl, 0x01A),
    READ_REMOTE_SUPPORTED_FEATURES = (LinkControl, 0x01B),
    READ_REMOTE_EXTENDED_FEATURES = (LinkControl, 0x01C),
    READ_REMOTE_VERSION_INFORMATION = (LinkControl, 0x01D),
    READ_CLOCK_OFFSET = (LinkControl, 0x01F),
    SETUP_SYNCHRONOUS_CONNECTION = (LinkControl, 0x028),
    ACCEPT_SYNCHRONOUS_CONNECTION_REQUEST = (LinkControl, 0x029),
    REJECT_SYNCHRONOUS_CONNECTION_REQUEST = (LinkControl, 0x02A),
    IO_CAPABILITY_REQUEST_REPLY = (LinkControl, 0x02B),
    USER_CONFIRMATION_REQUEST_REPLY = (LinkControl, 0x02C),
    USER_CONFIRMATION_REQUEST_NEGATIVE_REPLY = (LinkControl, 0x02D),
    USER_PASSKEY_REQUEST_REPLY = (LinkControl, 0x02E),
    USER_PASSKEY_REQUEST_NEGATIVE_REPLY = (LinkControl, 0x02F),
    REMOTE_OOB_DATA_REQUEST_REPLY = (LinkControl, 0x030),
    REMOTE_OOB_DATA_REQUEST_NEGATIVE_REPLY = (LinkControl, 0x033),
    IO_CAPABILITY_REQUEST_NEGATIVE_REPLY = (LinkControl, 0x034),
    CREATE_PHYSICAL_LINK = (LinkControl, 0x035),
    ACCEPT_PHYSICAL_LINK = (LinkControl, 0x036),
    DISCONNECT_PHYSICAL_LINK = (LinkControl, 0x037),
    CREATE_LOGICAL_LINK = (LinkControl, 0x038),
    ACCEPT_LOGICAL_LINK = (LinkControl, 0x039),
    DISCONNECT_LOGICAL_LINK = (LinkControl, 0x03A),
    LOGICAL_LINK_CANCEL = (LinkControl, 0x03B),
    SET_CONNECTIONLESS_PERIPHERAL_BROADCAST = (LinkControl, 0x041),
    START_SYNCHRONIZATION_TRAIN = (LinkControl, 0x043),
    REMOTE_OOB_EXTENDED_DATA_REQUEST_REPLY = (LinkControl, 0x045),

    // Link Policy commands ([Vol 4] Part E, Section 7.2)
    SNIFF_MODE = (LinkPolicy, 0x003),
    EXIT_SNIFF_MODE = (LinkPolicy, 0x004),
    ROLE_DISCOVERY = (LinkPolicy, 0x009),
    SWITCH_ROLE = (LinkPolicy, 0x00B),
    READ_LINK_POLICY_SETTINGS = (LinkPolicy, 0x00C),
    WRITE_LINK_POLICY_SETTINGS = (LinkPolicy, 0x00D),
    READ_DEFAULT_LINK_POLICY_SETTINGS = (LinkPolicy, 0x00E),
    WRITE_DEFAULT_LINK_POLICY_SETTINGS = (LinkPolicy, 0x00F),
    SNIFF_SUBRATING = (LinkPolicy, 0x011),

    // HCI Control and Baseband commands ([Vol 4] Part E, Section 7.3)
    SET_EVENT_MASK = (HciControl, 0x001),
    RESET = (HciControl, 0x003),
    SET_EVENT_FILTER = (HciControl, 0x005),

    // Informational parameters commands ([Vol 4] Part E, Section 7.4)
    READ_LOCAL_VERSION_INFORMATION = (InfoParams, 0x001),
    READ_LOCAL_SUPPORTED_COMMANDS = (InfoParams, 0x002),
    READ_LOCAL_SUPPORTED_FEATURES = (InfoParams, 0x003),
    READ_LOCAL_EXTENDED_FEATURES = (InfoParams, 0x004),

    // Vendor-specific commands
    QCA_COMMAND_COMPLETE = (Vendor, 0x000),
    INTEL_RESET = (Vendor, 0x001),
    INTEL_MANUFACTURER_MODE = (Vendor, 0x011),
    BCM_DOWNLOAD_MINIDRIVER = (Vendor, 0x02E),
    BCM_END_OF_RECORD = (Vendor, 0x04E),
    INTEL_SET_EVENT_MASK = (Vendor, 0x052),
    BCM_WAKEUP = (Vendor, 0x053),
    BCM_READ_VERBOSE_CONFIG = (Vendor, 0x079),
}

/// HCI event codes ([Vol 4] Part E, Section 7.7).
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum EventCode {
    InquiryComplete = 0x01,
    InquiryResult = 0x02,
    ConnectionComplete = 0x03,
    ConnectionRequest = 0x04,
    DisconnectionComplete = 0x05,
    AuthenticationComplete = 0x06,
    RemoteNameRequestComplete = 0x07,
    EncryptionChange = 0x08,
    ChangeConnectionLinkKeyComplete = 0x09,
    ReadRemoteSupportedFeaturesComplete = 0x0B,
    ReadRemoteVersionInformationComplete = 0x0C,
    QosSetupComplete = 0x0D,
    CommandComplete = 0x0E,
    CommandStatus = 0x0F,
    HardwareError = 0x10,
    RoleChange = 0x12,
    NumberOfCompletedPackets = 0x13,
    ModeChange = 0x14,
    PinCodeRequest = 0x16,
    LinkKeyRequest = 0x17,
    LinkKeyNotification = 0x18,
    ReadClockOffsetComplete = 0x1C,
    ConnectionPacketTypeChanged = 0x1D,
    PageScanRepetitionModeChange = 0x20,
    InquiryResultWithRssi = 0x22,
    ReadRemoteExtendedFeaturesComplete = 0x23,
    SynchronousConnectionComplete = 0x2C,
    SynchronousConnectionChanged = 0x2D,
    SniffSubrating = 0x2E,
    ExtendedInquiryResult = 0x2F,
    EncryptionKeyRefreshComplete = 0x30,
    IoCapabilityRequest = 0x31,
    IoCapabilityResponse = 0x32,
    UserConfirmationRequest = 0x33,
    UserPasskeyRequest = 0x34,
    RemoteOobDataRequest = 0x35,
    SimplePairingComplete = 0x36,
    UserPasskeyNotification = 0x3B,
    KeypressNotification = 0x3C,
    RemoteHostSupportedFeaturesNotification = 0x3D,
    LeMetaEvent = 0x3E,
    PhysicalLinkComplete = 0x40,
    ChannelSelected = 0x41,
    DisconnectionPhysicalLinkComplete = 0x42,
    LogicalLinkComplete = 0x45,
    DisconnectionLogicalLinkComplete = 0x46,
    NumberOfCompletedDataBlocks = 0x48,
    SynchronizationTrainComplete = 0x4F,
    PeripheralPageResponseTimeout = 0x54,
    Vendor = 0xFF, // [Vol 4] Part E, Section 5.4.4
}

/// HCI packet indicators ([Vol 4] Part A, Section 2).
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum PacketType {
    Command = 0x01,
    Acl = 0x02,
    Sco = 0x03,
    Event = 0x04,
    Diagnostic = 0xF0,
    Vendor = 0xFF,
}

/// HCI status code ([Vol 1] Part F, Section 1.3).
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, thiserror::Error)]
#[repr(transparent)]
pub struct Status(pub u8);

impl Status {
    pub const SUCCESS: Self = Self(0x00);
    pub const UNKNOWN_COMMAND: Self = Self(0x01);
    pub const UNKNOWN_CONNECTION_IDENTIFIER: Self = Self(0x02);
    pub const HARDWARE_FAILURE: Self = Self(0x03);
    pub const MEMORY_CAPACITY_EXCEEDED: Self = Self(0x07);
    pub const COMMAND_DISALLOWED: Self = Self(0x0C);
    pub const UNSUPPORTED_FEATURE_OR_PARAMETER_VALUE: Self = Self(0x11);
    pub const INVALID_COMMAND_PARAMETERS: Self = Self(0x12);
    pub const UNSPECIFIED_ERROR: Self = Self(0x1F);
    pub const CONTROLLER_BUSY: Self = Self(0x3A);

    /// Returns whether status is `SUCCESS`.
    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    /// Returns the status name or `None` if the status is not known.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::SUCCESS => "Success",
            Self::UNKNOWN_COMMAND => "Unknown HCI Command",
            Self::UNKNOWN_CONNECTION_IDENTIFIER => "Unknown Connection Identifier",
            Self::HARDWARE_FAILURE => "Hardware Failure",
            Self::MEMORY_CAPACITY_EXCEEDED => "Memory Capacity Exceeded",
            Self::COMMAND_DISALLOWED => "Command Disallowed",
            Self::UNSUPPORTED_FEATURE_OR_PARAMETER_VALUE => "Unsupported Feature or Parameter Value",
            Self::INVALID_COMMAND_PARAMETERS => "Invalid HCI Command Parameters",
            Self::UNSPECIFIED_ERROR => "Unspecified Error",
            Self::CONTROLLER_BUSY => "Controller Busy",
            _ => return None,
        })
    }
}

impl From<u8> for Status {
    #[inline(always)]
    fn from(v: u8) -> Self {
        Self(v)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#04X})", self.0),
            None => write!(f, "{:#04X}", self.0),
        }
    }
}
