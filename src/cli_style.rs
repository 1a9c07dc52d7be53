use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Color as CtColor, Stylize};
use unicode_width::UnicodeWidthStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Color Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const CYAN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 255,
    };
    pub const MAGENTA: Color = Color::Rgb {
        r: 255,
        g: 0,
        b: 255,
    };
    pub const PURPLE: Color = Color::Rgb {
        r: 180,
        g: 100,
        b: 255,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 136,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 165,
        b: 0,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Box Drawing Characters
// ═══════════════════════════════════════════════════════════════════════════════

pub mod box_chars {
    pub const SINGLE_HORIZONTAL: &str = "─";
    pub const SINGLE_VERTICAL: &str = "│";

    // Rounded box
    pub const ROUND_TOP_LEFT: &str = "╭";
    pub const ROUND_TOP_RIGHT: &str = "╮";
    pub const ROUND_BOTTOM_LEFT: &str = "╰";
    pub const ROUND_BOTTOM_RIGHT: &str = "╯";

    // T-junctions
    pub const T_LEFT: &str = "├";
    pub const T_RIGHT: &str = "┤";
    pub const T_TOP: &str = "┬";
    pub const T_BOTTOM: &str = "┴";
    pub const CROSS: &str = "┼";

    pub const BULLET: &str = "●";
    pub const BULLET_EMPTY: &str = "○";
    pub const DIAMOND: &str = "◆";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
    pub const TREND_UP: &str = "▲";
    pub const TREND_FLAT: &str = "■";
    pub const TREND_DOWN: &str = "▼";
}

// ═══════════════════════════════════════════════════════════════════════════════
// Status Indicators
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        box_chars::CHECK.to_string().with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    eprintln!(
        " {} {}",
        box_chars::CROSS_MARK.to_string().with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        "⚠".with(colors::ORANGE).bold(),
        message.with(colors::ORANGE)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Section Headers
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_section_header(title: &str) {
    let width: usize = 60;
    let title_len = title.width();
    let padding = width.saturating_sub(title_len + 4) / 2;

    println!();
    print!("{}", box_chars::ROUND_TOP_LEFT.with(colors::CYAN));
    print!(
        "{}",
        box_chars::SINGLE_HORIZONTAL
            .repeat(padding)
            .with(colors::CYAN)
    );
    print!(
        " {} ",
        title.with(colors::CYAN).bold().attribute(Attribute::Italic)
    );
    print!(
        "{}",
        box_chars::SINGLE_HORIZONTAL
            .repeat(width.saturating_sub(title_len + 4 + padding))
            .with(colors::CYAN)
    );
    println!("{}", box_chars::ROUND_TOP_RIGHT.with(colors::CYAN));
}

pub fn print_section_footer() {
    let width = 60;
    print!("{}", box_chars::ROUND_BOTTOM_LEFT.with(colors::CYAN));
    print!(
        "{}",
        box_chars::SINGLE_HORIZONTAL
            .repeat(width)
            .with(colors::CYAN)
    );
    println!("{}", box_chars::ROUND_BOTTOM_RIGHT.with(colors::CYAN));
    println!();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Key-Value Display
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        box_chars::BULLET.with(colors::PURPLE),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

pub fn print_key_value_highlight(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        box_chars::DIAMOND.with(colors::MAGENTA),
        format!("{}:", key).with(colors::CYAN).bold(),
        value.with(colors::GREEN).bold()
    );
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        box_chars::BULLET_EMPTY.with(colors::DIM),
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

/// Arrow and color for a growth trend label.
pub fn trend_marker(trend: &str) -> (&'static str, CtColor) {
    match trend {
        "increasing" => (box_chars::TREND_UP, colors::GREEN),
        "decreasing" => (box_chars::TREND_DOWN, colors::RED),
        _ => (box_chars::TREND_FLAT, colors::DIM),
    }
}

pub fn print_trend(key: &str, trend: &str) {
    let (marker, color) = trend_marker(trend);
    println!(
        "  {} {} {} {}",
        box_chars::BULLET.with(colors::PURPLE),
        format!("{}:", key).with(colors::DIM),
        marker.with(color).bold(),
        trend.with(color)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Table Display
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: Vec<&str>) -> Self {
        let col_widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
        TableBuilder {
            headers: headers.into_iter().map(String::from).collect(),
            rows: Vec::new(),
            col_widths,
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (i, cell) in row.iter().enumerate() {
            if i < self.col_widths.len() {
                self.col_widths[i] = self.col_widths[i].max(cell.width());
            }
        }
        self.rows.push(row);
    }

    fn print_border(&self, left: &str, junction: &str, right: &str) {
        print!("{}", left.with(colors::CYAN));
        for (i, width) in self.col_widths.iter().enumerate() {
            print!(
                "{}",
                box_chars::SINGLE_HORIZONTAL
                    .repeat(width + 2)
                    .with(colors::CYAN)
            );
            if i < self.col_widths.len() - 1 {
                print!("{}", junction.with(colors::CYAN));
            }
        }
        println!("{}", right.with(colors::CYAN));
    }

    pub fn print(&self) {
        if self.col_widths.is_empty() {
            return;
        }

        self.print_border(
            box_chars::ROUND_TOP_LEFT,
            box_chars::T_TOP,
            box_chars::ROUND_TOP_RIGHT,
        );

        print!("{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
        for (i, header) in self.headers.iter().enumerate() {
            let padding = self.col_widths[i] - header.width();
            print!(
                " {}{} ",
                header.clone().with(colors::CYAN).bold(),
                " ".repeat(padding)
            );
            print!("{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
        }
        println!();

        self.print_border(box_chars::T_LEFT, box_chars::CROSS, box_chars::T_RIGHT);

        for row in &self.rows {
            print!("{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
            for (i, cell) in row.iter().enumerate() {
                let width = self.col_widths.get(i).unwrap_or(&0);
                let padding = width.saturating_sub(cell.width());
                print!(
                    " {}{} ",
                    cell.clone().with(colors::WHITE),
                    " ".repeat(padding)
                );
                print!("{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
            }
            println!();
        }

        self.print_border(
            box_chars::ROUND_BOTTOM_LEFT,
            box_chars::T_BOTTOM,
            box_chars::ROUND_BOTTOM_RIGHT,
        );
    }
}
