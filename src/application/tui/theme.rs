use ratatui::style::Color;

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
}

#[derive(Debug, Clone)]
pub struct ThemeColors {
    // Calendar cells
    pub focused: Color,
    pub dimmed: Color,
    pub weekend: Color,
    pub today: Color,
    pub selected_bg: Color,
    pub focused_week_bg: Color,

    // Completion marks
    pub done: Color,
    pub pending: Color,

    // Chrome
    pub header: Color,
    pub help_text: Color,
    pub error_text: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "Dark".to_string(),
            colors: ThemeColors {
                focused: Color::White,
                dimmed: Color::DarkGray,
                weekend: Color::Rgb(150, 150, 150),
                today: Color::Yellow,
                selected_bg: Color::Rgb(40, 40, 40),
                focused_week_bg: Color::Rgb(28, 28, 28),

                done: Color::LightGreen,
                pending: Color::Yellow,

                header: Color::Cyan,
                help_text: Color::DarkGray,
                error_text: Color::LightRed,
            },
        }
    }

    pub fn light() -> Self {
        Self {
            name: "Light".to_string(),
            colors: ThemeColors {
                focused: Color::Black,
                dimmed: Color::Gray,
                weekend: Color::Gray,
                today: Color::Blue,
                selected_bg: Color::Rgb(220, 220, 220),
                focused_week_bg: Color::Rgb(240, 240, 240),

                done: Color::Green,
                pending: Color::Magenta,

                header: Color::Blue,
                help_text: Color::Blue,
                error_text: Color::Red,
            },
        }
    }

    pub fn minimal() -> Self {
        Self {
            name: "Minimal".to_string(),
            colors: ThemeColors {
                focused: Color::White,
                dimmed: Color::DarkGray,
                weekend: Color::DarkGray,
                today: Color::White,
                selected_bg: Color::Rgb(40, 40, 40),
                focused_week_bg: Color::Rgb(28, 28, 28),

                done: Color::White,
                pending: Color::Gray,

                header: Color::White,
                help_text: Color::Gray,
                error_text: Color::White,
            },
        }
    }

    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "light" => Self::light(),
            "minimal" => Self::minimal(),
            _ => Self::dark(), // default
        }
    }

    pub fn available_themes() -> Vec<String> {
        vec!["dark".to_string(), "light".to_string(), "minimal".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_fall_back_to_dark() {
        assert_eq!(Theme::by_name("LIGHT").name, "Light");
        assert_eq!(Theme::by_name("solarized").name, "Dark");
        assert_eq!(Theme::available_themes().len(), 3);
    }
}
