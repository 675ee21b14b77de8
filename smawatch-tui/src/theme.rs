//! Parrot/neon theme tokens for the smawatch dashboard
//!
//! # Color Palette
//! - **Accent**: Electric cyan (focus, headers)
//! - **Positive**: Neon green (oversold, trading below the long average)
//! - **Negative**: Hot pink (overbought, stretched above the long average)
//! - **Warning**: Neon orange (alerts, skipped tickers)
//! - **Neutral**: Cool purple (neutral label)
//! - **Muted**: Steel blue (secondary text, hints)

use ratatui::style::{Color, Modifier, Style};
use smawatch_core::classify::Classification;

/// Parrot/neon theme for the smawatch TUI
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub accent: Color,
    pub positive: Color,
    pub negative: Color,
    pub warning: Color,
    pub neutral: Color,
    pub muted: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::parrot_neon()
    }
}

impl Theme {
    pub const fn parrot_neon() -> Self {
        Self {
            accent: Color::Rgb(0, 255, 255),
            positive: Color::Rgb(0, 255, 128),
            negative: Color::Rgb(255, 20, 147),
            warning: Color::Rgb(255, 140, 0),
            neutral: Color::Rgb(147, 112, 219),
            muted: Color::Rgb(100, 149, 237),
            text_primary: Color::White,
            text_secondary: Color::Rgb(170, 170, 170),
        }
    }

    /// Overbought rows are stretched (pink), oversold rows are cheap (green).
    pub fn classification_color(&self, label: Classification) -> Color {
        match label {
            Classification::Overbought => self.negative,
            Classification::Oversold => self.positive,
            Classification::Neutral => self.neutral,
        }
    }

    /// Sign color for a deviation; zero reads as neutral.
    pub fn deviation_color(&self, deviation: f64) -> Color {
        if deviation > 0.0 {
            self.negative
        } else if deviation < 0.0 {
            self.positive
        } else {
            self.neutral
        }
    }
}

const THEME: Theme = Theme::parrot_neon();

pub fn accent() -> Style {
    Style::default().fg(THEME.accent)
}

pub fn accent_bold() -> Style {
    accent().add_modifier(Modifier::BOLD)
}

pub fn muted() -> Style {
    Style::default().fg(THEME.muted)
}

pub fn text() -> Style {
    Style::default().fg(THEME.text_primary)
}

pub fn secondary() -> Style {
    Style::default().fg(THEME.text_secondary)
}

pub fn neutral() -> Style {
    Style::default().fg(THEME.neutral)
}

pub fn warning() -> Style {
    Style::default().fg(THEME.warning)
}

pub fn negative() -> Style {
    Style::default().fg(THEME.negative)
}

pub fn positive() -> Style {
    Style::default().fg(THEME.positive)
}

pub fn label_style(label: Classification) -> Style {
    Style::default().fg(THEME.classification_color(label))
}

pub fn deviation_style(deviation: f64) -> Style {
    Style::default().fg(THEME.deviation_color(deviation))
}

pub fn panel_border(active: bool) -> Style {
    if active {
        accent()
    } else {
        muted()
    }
}

pub fn panel_title(active: bool) -> Style {
    if active {
        accent_bold()
    } else {
        muted()
    }
}
