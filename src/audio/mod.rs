// Audio module - click synthesis, the audio resource traits and the desktop backend

pub mod click;
pub mod mixer;
pub mod output;

cfg_if::cfg_if! {
    if #[cfg(not(target_os = "android"))] {
        pub mod engine_cpal;
        pub use engine_cpal::CpalDevice;
    }
}

// Re-export commonly used types for convenience
pub use click::{render_click, ClickBank, ClickKind};
pub use mixer::{ClickCue, ClickMixer};
pub use output::{AudioDevice, AudioOutput};
