//! Style roles expressed as an enum + macro mapping logical names to `colored::Color`.
//!
//! Each role (Header, Success, etc.) is a variant of `StyleRole`. Colour is applied
//! only when the `enabled` flag passed in is true, so nothing here reads global state.
//!
//! ```
//! use callqueue::core::styles::StyleRole;
//! let plain = StyleRole::Header.paint("Call", false);
//! assert_eq!(plain, "Call");
//! let colored = StyleRole::Header.paint("Call", true);
//! assert!(colored.starts_with("\x1b["));
//! assert!(colored.ends_with("\x1b[0m"));
//! ```

use clap::builder::styling::AnsiColor;
use colored::Color;

// Defines the enum variants and their associated colour Option.
macro_rules! style {
    ( $( $variant:ident => $color:expr ),+ $(,)? ) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum StyleRole { $( $variant ),+ }

        impl StyleRole {
            pub fn color(self) -> Option<Color> {
                match self { $( StyleRole::$variant => $color ),+ }
            }

            pub fn ansi_code(self) -> Option<String> {
                map_color_code(self.color()?)
            }

            pub fn paint(self, text: &str, enabled: bool) -> String {
                if !enabled { return text.to_string(); }
                if let Some(code) = self.ansi_code() { return format!("\x1b[{}m{}\x1b[0m", code, text); }
                text.to_string()
            }

            /// prettytable `style_spec` for this role, e.g. `"Fg"`
            pub fn to_prettytable_spec(self) -> Option<String> {
                let spec_char = match self.color()? {
                    Color::Black => "k",
                    Color::Red => "r",
                    Color::Green => "g",
                    Color::Yellow => "y",
                    Color::Blue => "b",
                    Color::Magenta => "m",
                    Color::Cyan => "c",
                    Color::White => "w",
                    Color::BrightBlack => "K",
                    Color::BrightRed => "R",
                    Color::BrightGreen => "G",
                    Color::BrightYellow => "Y",
                    Color::BrightBlue => "B",
                    Color::BrightMagenta => "M",
                    Color::BrightCyan => "C",
                    Color::BrightWhite => "W",
                    _ => return None,
                };
                Some(format!("F{}", spec_char))
            }
        }
    }
}

style! {
    Header    => Some(Color::Yellow),
    Literal   => Some(Color::Cyan),
    Placeholder => Some(Color::Green),
    Success   => Some(Color::Green),
    Failure   => Some(Color::Red),
    Cancelled => Some(Color::BrightYellow),
    Error     => Some(Color::BrightRed),
    Value     => None,
    Dim       => Some(Color::BrightBlack)
}

fn map_color_code(c: Color) -> Option<String> {
    use Color::*;
    match c {
        Black => Some("30".to_string()),
        Red => Some("31".to_string()),
        Green => Some("32".to_string()),
        Yellow => Some("33".to_string()),
        Blue => Some("34".to_string()),
        Magenta => Some("35".to_string()),
        Cyan => Some("36".to_string()),
        White => Some("37".to_string()),
        BrightBlack => Some("90".to_string()),
        BrightRed => Some("91".to_string()),
        BrightGreen => Some("92".to_string()),
        BrightYellow => Some("93".to_string()),
        BrightBlue => Some("94".to_string()),
        BrightMagenta => Some("95".to_string()),
        BrightCyan => Some("96".to_string()),
        BrightWhite => Some("97".to_string()),
        TrueColor { r, g, b } => Some(format!("38;2;{};{};{}", r, g, b)),
    }
}

fn color_to_ansi(c: Color) -> Option<AnsiColor> {
    use AnsiColor as A;
    use Color::*;
    Some(match c {
        Black => A::Black,
        Red => A::Red,
        Green => A::Green,
        Yellow => A::Yellow,
        Blue => A::Blue,
        Magenta => A::Magenta,
        Cyan => A::Cyan,
        White => A::White,
        BrightBlack => A::BrightBlack,
        BrightRed => A::BrightRed,
        BrightGreen => A::BrightGreen,
        BrightYellow => A::BrightYellow,
        BrightBlue => A::BrightBlue,
        BrightMagenta => A::BrightMagenta,
        BrightCyan => A::BrightCyan,
        BrightWhite => A::BrightWhite,
        _ => return None,
    })
}

/// clap help styles built from the same roles
pub fn palette_to_clap(enabled: bool) -> clap::builder::Styles {
    use clap::builder::styling::{Color as ClapColor, Style};
    if !enabled {
        return clap::builder::Styles::plain();
    }

    let style = |role: StyleRole, bold: bool| {
        let mut s = Style::new();
        if let Some(col) = role.color().and_then(color_to_ansi) {
            s = s.fg_color(Some(ClapColor::Ansi(col)));
        }
        if bold {
            s = s.bold();
        }
        s
    };

    clap::builder::Styles::styled()
        .header(style(StyleRole::Header, true))
        .literal(style(StyleRole::Literal, false))
        .placeholder(style(StyleRole::Placeholder, false))
        .valid(style(StyleRole::Success, false))
        .invalid(style(StyleRole::Failure, false))
        .error(style(StyleRole::Error, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_code_header() {
        assert_eq!(StyleRole::Header.ansi_code(), Some("33".to_string()));
    }

    #[test]
    fn paint_enabled_disabled() {
        let colored = StyleRole::Failure.paint("boom", true);
        assert!(colored.starts_with("\x1b[31m") && colored.ends_with("\x1b[0m"));
        assert_eq!(StyleRole::Failure.paint("boom", false), "boom");
        assert_eq!(StyleRole::Value.paint("42", true), "42");
    }

    #[test]
    fn prettytable_specs() {
        assert_eq!(StyleRole::Success.to_prettytable_spec().as_deref(), Some("Fg"));
        assert_eq!(StyleRole::Cancelled.to_prettytable_spec().as_deref(), Some("FY"));
        assert_eq!(StyleRole::Value.to_prettytable_spec(), None);
    }

    #[test]
    fn truecolor_code() {
        let code = map_color_code(Color::TrueColor { r: 255, g: 128, b: 64 });
        assert_eq!(code.as_deref(), Some("38;2;255;128;64"));
    }

    #[test]
    fn palette_to_clap_differs_when_enabled() {
        let plain_dbg = format!("{:?}", palette_to_clap(false));
        let styled_dbg = format!("{:?}", palette_to_clap(true));
        assert_ne!(plain_dbg, styled_dbg);
    }
}
