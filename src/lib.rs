// tapkey - tap gesture to keyboard composer
// Tap maps, multitap debounce, mode stack and keyboard output scheduling

pub mod config;
pub mod device;
pub mod engine;
pub mod key_action;
pub mod keyboard;
pub mod keys;
pub mod mode_stack;
pub mod multitap;
pub mod scheduler;
pub mod script;
pub mod tapmap;

pub use config::{OutputBackend, Settings};
pub use device::{DeviceEvent, LoggingDevice, TapDevice};
pub use engine::{Engine, EngineConfig, Notice, TapFeedback};
pub use key_action::{KeyAction, SequenceStep};
pub use keyboard::{ComposeState, Keyboard};
pub use mode_stack::{ModeStack, ModeSwitchEvent, StackEffect};
pub use multitap::{MultitapComposer, MultitapEvent};
pub use scheduler::{EventQueue, OutputScheduler, TickReport};
pub use script::{Script, ScriptError, ScriptStep};
pub use tapmap::{HotkeyEntry, MapError, Mode, ModeAction, ModeSwitch, ResolvedMap};

pub use tapkey_output as output;
