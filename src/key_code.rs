/// A Linux input key code (the `code` of an `EV_KEY` event).
///
/// Only the codes the daemon reacts to are named. See [input-event-codes.h].
///
/// [input-event-codes.h]: https://elixir.bootlin.com/linux/v5.19.17/source/include/uapi/linux/input-event-codes.h#L65
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const A: KeyCode = KeyCode(30);
    pub const LEFTCTRL: KeyCode = KeyCode(29);
    pub const RIGHTCTRL: KeyCode = KeyCode(97);
    pub const F1: KeyCode = KeyCode(59);
    pub const F9: KeyCode = KeyCode(67);
    pub const F10: KeyCode = KeyCode(68);
    pub const F11: KeyCode = KeyCode(87);
    pub const F12: KeyCode = KeyCode(88);

    /// Whether this key is one of the hotkey modifiers (left or right Ctrl).
    pub fn is_modifier(self) -> bool {
        self == Self::LEFTCTRL || self == Self::RIGHTCTRL
    }
}

impl From<u16> for KeyCode {
    fn from(code: u16) -> Self {
        KeyCode(code)
    }
}
