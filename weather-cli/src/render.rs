//! Terminal adapter for the core view state.

use weather_core::{View, ViewState, view::ERROR_MESSAGE};

const INITIAL_MESSAGE: &str = "Search for a city to see the current weather and forecast.";

pub fn print_view(view: &View) {
    for line in render_lines(view) {
        println!("{line}");
    }
}

pub fn render_lines(view: &View) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(prompt) = &view.prompt {
        lines.push(format!("! {prompt}"));
    }

    match view.state() {
        ViewState::Initial => lines.push(INITIAL_MESSAGE.to_string()),
        ViewState::Loading => lines.push("Loading...".to_string()),
        ViewState::Error => lines.push(ERROR_MESSAGE.to_string()),
        ViewState::Result(result) => {
            let current = &result.current;
            lines.push(current.label.clone());
            lines.push(format!("  {}  {}", current.temperature, current.description));
            lines.push(format!(
                "  Feels like {} | Humidity {} | Wind {}",
                current.feels_like, current.humidity, current.wind
            ));
            lines.push(format!("  Icon: {}", current.icon_url));

            if !result.forecast.is_empty() {
                lines.push("Forecast:".to_string());
                for day in &result.forecast {
                    lines.push(format!("  {:<4}{:>6}  {}", day.day, day.temperature, day.icon_alt));
                }
            }
        }
    }

    lines
}
