//! DisplayPort hot-plug-detect vocabulary

/// Semantic HPD event handed to the PD protocol layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HpdEvent {
    /// Nothing reported yet
    #[default]
    None,
    /// Downstream display sink detached
    Low,
    /// Downstream display sink attached
    High,
    /// Downstream display sink signalled an interrupt
    Irq,
}

impl HpdEvent {
    /// Level event matching a raw line level
    pub const fn from_level(level: bool) -> Self {
        if level {
            HpdEvent::High
        } else {
            HpdEvent::Low
        }
    }
}
