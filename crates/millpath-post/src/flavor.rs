//! Post flavor definitions.
//!
//! Each controller dialect is a [`PostConfig`] record: modal codes,
//! capabilities and the header, footer and step-banner templates rendered
//! by [`crate::template`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PostError, Result};

/// Supported controller dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFlavor {
    /// GRBL hobby routers.
    #[default]
    Grbl,
    /// Fanuc-style industrial controls.
    Fanuc,
    /// Marlin firmware without a spindle.
    Marlin,
    /// Heidenhain conversational (`L` moves).
    Heidenhain,
}

/// How motion lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStyle {
    /// `G0`/`G1`/`G2`/`G3` words with a separate `F` line per cut.
    GWords,
    /// `L X Y Z F…` for feeds and `L X Y Z FMAX` for rapids.
    Conversational,
}

/// Everything the emitter needs to know about a dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct PostConfig {
    /// Name shown in the header.
    pub name: &'static str,
    /// Absolute positioning code.
    pub positioning_mode: &'static str,
    /// Plane selection code, if the dialect emits one.
    pub plane_code: Option<&'static str>,
    /// Feed mode code, if the dialect emits one.
    pub feed_mode: Option<&'static str>,
    /// Work offset, if the dialect emits one.
    pub work_offset: Option<&'static str>,
    /// The controller drives a spindle.
    pub spindle_supported: bool,
    /// The controller accepts G2/G3.
    pub supports_arcs: bool,
    /// A cut may start with a standalone `F` word.
    pub supports_feed_command: bool,
    /// Spindle start code.
    pub spindle_on: &'static str,
    /// Spindle stop code.
    pub spindle_off: &'static str,
    /// Program end code.
    pub program_end: &'static str,
    /// Line terminator.
    pub newline: &'static str,
    /// Header template.
    pub header: &'static str,
    /// Footer template.
    pub footer: &'static str,
    /// Template rendered when a new strategy step starts.
    pub step_block: &'static str,
    /// Motion line format.
    pub move_style: MoveStyle,
}

const DEFAULT_STEP_BLOCK: &str = "(STEP {{step_number}} {{step_label}} {{pass_kind}} \
stepover={{stepover_mm}}mm stepdown={{stepdown_mm}}mm{{#if has_angle}} angle={{angle_deg}}deg{{/if}})";

impl PostConfig {
    /// A G-word dialect with the common modal defaults.
    fn gcode(name: &'static str) -> Self {
        Self {
            name,
            positioning_mode: "G90",
            plane_code: Some("G17"),
            feed_mode: Some("G94"),
            work_offset: None,
            spindle_supported: true,
            supports_arcs: true,
            supports_feed_command: true,
            spindle_on: "M3",
            spindle_off: "M5",
            program_end: "M2",
            newline: "\n",
            header: "",
            footer: "",
            step_block: DEFAULT_STEP_BLOCK,
            move_style: MoveStyle::GWords,
        }
    }

    /// GRBL routers.
    pub fn grbl() -> Self {
        Self {
            newline: "\r\n",
            header: "(millpath - {{post_name}} Post)\r\n\
                     {{unit_code}} ; units\r\n\
                     {{positioning_mode}} ; absolute positioning\r\n\
                     {{machine_summary}}\r\n\
                     {{#if spindle_requested}}{{spindle_on_code}} S{{spindle_speed}} ; spindle on\r\n{{/if}}",
            footer: "{{spindle_off_code}} ; spindle off\r\n{{program_end_code}}\r\n",
            ..Self::gcode("GRBL")
        }
    }

    /// Fanuc-style controls.
    pub fn fanuc() -> Self {
        Self {
            work_offset: Some("G54"),
            program_end: "M30",
            newline: "\r\n",
            header: "(millpath - {{post_name}} Post)\r\n\
                     {{work_offset}}\r\n\
                     {{unit_code}}\r\n\
                     {{plane_code}}\r\n\
                     {{positioning_mode}}\r\n\
                     {{feed_mode}}\r\n\
                     {{machine_summary}}\r\n\
                     {{#if spindle_supported}}{{#if spindle_requested}}{{spindle_on_code}} S{{spindle_speed}}\r\n\
                     {{else}}{{spindle_on_code}}\r\n{{/if}}{{else}}(Spindle not supported)\r\n{{/if}}",
            footer: "{{#if spindle_supported}}{{spindle_off_code}}\r\n{{/if}}{{program_end_code}}\r\n",
            ..Self::gcode("Fanuc")
        }
    }

    /// Marlin firmware.
    pub fn marlin() -> Self {
        Self {
            plane_code: None,
            feed_mode: None,
            spindle_supported: false,
            program_end: "M84",
            header: "; millpath - {{post_name}} Post\n\
                     {{unit_code}} ; units\n\
                     {{positioning_mode}} ; absolute positioning\n\
                     ; {{machine_summary}}\n\
                     {{#if spindle_requested}}; Requested spindle {{spindle_speed}} but controller has no spindle\n{{/if}}\
                     {{#if arcs_enabled}}; Arcs enabled (G2/G3)\n{{else}}; Arcs disabled (linearized)\n{{/if}}",
            footer: "M400 ; wait for moves to finish\n{{program_end_code}} ; disable motors\n",
            ..Self::gcode("Marlin")
        }
    }

    /// Heidenhain conversational.
    pub fn heidenhain() -> Self {
        Self {
            plane_code: None,
            feed_mode: None,
            supports_arcs: false,
            supports_feed_command: false,
            spindle_on: "M3",
            spindle_off: "M5",
            program_end: "END PGM MILLPATH",
            header: "BEGIN PGM MILLPATH {{unit_keyword}}\n\
                     ; {{post_name}} post\n\
                     ; Machine: {{machine_plain}}\n\
                     ; Rapid {{rapid_feed}} {{unit_suffix}}, Max feed {{max_feed}} {{unit_suffix}}\n\
                     ; Feed {{feed_rate}} {{unit_suffix}}\n\
                     {{#if spindle_requested}}; Spindle {{spindle_speed}}\n{{/if}}\
                     {{#if arcs_enabled}}; Arcs retained where possible\n{{else}}; Arcs emitted as linear moves\n{{/if}}",
            footer: "{{#if spindle_requested}}; {{spindle_off_code}} (stop spindle)\n{{/if}}\
                     {{program_end_code}} {{unit_keyword}}\n",
            step_block: "; Step {{step_number}} {{step_label}} {{pass_kind}} \
                         stepover={{stepover_mm}}mm stepdown={{stepdown_mm}}mm\
                         {{#if has_angle}} angle={{angle_deg}}deg{{/if}}",
            move_style: MoveStyle::Conversational,
            ..Self::gcode("Heidenhain")
        }
    }
}

impl PostFlavor {
    /// Every flavor, in display order.
    pub const ALL: [PostFlavor; 4] = [
        PostFlavor::Grbl,
        PostFlavor::Fanuc,
        PostFlavor::Marlin,
        PostFlavor::Heidenhain,
    ];

    /// The configuration record for this flavor.
    pub fn config(self) -> PostConfig {
        match self {
            PostFlavor::Grbl => PostConfig::grbl(),
            PostFlavor::Fanuc => PostConfig::fanuc(),
            PostFlavor::Marlin => PostConfig::marlin(),
            PostFlavor::Heidenhain => PostConfig::heidenhain(),
        }
    }

    /// Lowercase identifier accepted by [`FromStr`].
    pub fn id(self) -> &'static str {
        match self {
            PostFlavor::Grbl => "grbl",
            PostFlavor::Fanuc => "fanuc",
            PostFlavor::Marlin => "marlin",
            PostFlavor::Heidenhain => "heidenhain",
        }
    }
}

impl FromStr for PostFlavor {
    type Err = PostError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        PostFlavor::ALL
            .into_iter()
            .find(|f| f.id() == wanted)
            .ok_or_else(|| PostError::UnknownFlavor(s.to_string()))
    }
}

impl fmt::Display for PostFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config().name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for flavor in PostFlavor::ALL {
            assert_eq!(flavor.id().parse::<PostFlavor>(), Ok(flavor));
        }
        assert_eq!("GRBL".parse::<PostFlavor>(), Ok(PostFlavor::Grbl));
        assert!(matches!("haas".parse::<PostFlavor>(), Err(PostError::UnknownFlavor(_))));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&PostFlavor::Heidenhain).unwrap();
        assert_eq!(json, "\"heidenhain\"");
        let back: PostFlavor = serde_json::from_str("\"fanuc\"").unwrap();
        assert_eq!(back, PostFlavor::Fanuc);
    }

    #[test]
    fn test_capabilities() {
        assert!(PostFlavor::Grbl.config().supports_arcs);
        assert!(!PostFlavor::Marlin.config().spindle_supported);
        let heidenhain = PostFlavor::Heidenhain.config();
        assert!(!heidenhain.supports_arcs);
        assert!(!heidenhain.supports_feed_command);
        assert_eq!(heidenhain.move_style, MoveStyle::Conversational);
        assert_eq!(PostFlavor::Fanuc.config().work_offset, Some("G54"));
        assert_eq!(PostFlavor::Fanuc.to_string(), "Fanuc");
    }
}
