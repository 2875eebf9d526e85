use std::fmt::Display;

/// Digital or analog. Determines the topic token and the payload semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinKind {
    /// A digital pin, switched high or low.
    Digital,

    /// An analog pin, driven with an integer intensity.
    Analog,
}

impl PinKind {
    /// The token used in the pub/sub topic namespace.
    pub fn topic_token(&self) -> &'static str {
        match self {
            PinKind::Digital => "D",
            PinKind::Analog => "A",
        }
    }
}

/// A pin on a device link.
/// Kind and index together identify it uniquely within one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinId {
    /// Digital or analog.
    pub kind: PinKind,

    /// The pin number.
    pub index: u32,
}

impl PinId {
    /// A digital pin.
    pub fn digital(index: u32) -> Self {
        Self {
            kind: PinKind::Digital,
            index,
        }
    }

    /// An analog pin.
    pub fn analog(index: u32) -> Self {
        Self {
            kind: PinKind::Analog,
            index,
        }
    }
}

impl Display for PinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.kind.topic_token(), self.index)
    }
}

/// Power state of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalState {
    /// Powered.
    High,

    /// Unpowered.
    Low,
}

impl DigitalState {
    pub(crate) fn wire_value(&self) -> i32 {
        match self {
            DigitalState::High => 1,
            DigitalState::Low => 0,
        }
    }
}

/// A state change the device reported for one pin.
///
/// Digital pins carry 0/1; analog pins carry the measured intensity.
/// Consumed once by whoever observes it, then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    /// Which pin changed.
    pub pin: PinId,

    /// The new value.
    pub value: i32,
}
