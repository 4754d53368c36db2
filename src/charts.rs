//! Plain SVG bar charts of the per-country table.
//!
//! Bars follow the row order of the summary (country ascending). The colour
//! palette cycles through the 20 colours of matplotlib's `tab20b` map.

use crate::schema::CountrySummary;
use std::fmt::Write;

const WIDTH: f64 = 1200.0;
const HEIGHT: f64 = 800.0;
const MARGIN_LEFT: f64 = 110.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_TOP: f64 = 70.0;
const MARGIN_BOTTOM: f64 = 150.0;

const PALETTE: [&str; 20] = [
    "#393b79", "#5254a3", "#6b6ecf", "#9c9ede", "#637939", "#8ca252", "#b5cf6b", "#cedb9c",
    "#8c6d31", "#bd9e39", "#e7ba52", "#e7cb94", "#843c39", "#ad494a", "#d6616b", "#e7969c",
    "#7b4173", "#a55194", "#ce6dbd", "#de9ed6",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    TotalSubmissions,
    PercentageUsage,
    NumberOfProjects,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [
        ChartKind::TotalSubmissions,
        ChartKind::PercentageUsage,
        ChartKind::NumberOfProjects,
    ];

    pub fn file_name(&self, period_key: &str) -> String {
        let stem = match self {
            ChartKind::TotalSubmissions => "total_usage",
            ChartKind::PercentageUsage => "percentage_usage",
            ChartKind::NumberOfProjects => "number_projects",
        };
        format!("{}_{}.svg", stem, period_key)
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::TotalSubmissions => "Total Submissions",
            ChartKind::PercentageUsage => "Percentage Usage",
            ChartKind::NumberOfProjects => "Number of Projects",
        }
    }

    fn y_label(&self) -> &'static str {
        match self {
            ChartKind::TotalSubmissions => "#Submission (log scale)",
            ChartKind::PercentageUsage => "Usage [%]",
            ChartKind::NumberOfProjects => "#Projects",
        }
    }

    fn value(&self, row: &CountrySummary) -> f64 {
        match self {
            ChartKind::TotalSubmissions => row.submission_total as f64,
            ChartKind::PercentageUsage => row.submission_share_percent,
            ChartKind::NumberOfProjects => row.project_count as f64,
        }
    }
}

enum Scale {
    Linear { max: f64 },
    Log { max_exp: f64 },
}

impl Scale {
    fn for_chart(kind: ChartKind, max_value: f64) -> Self {
        match kind {
            // axis runs from 1 to ten times the largest total
            ChartKind::TotalSubmissions => Scale::Log {
                max_exp: (max_value.max(1.0) * 10.0).log10(),
            },
            ChartKind::PercentageUsage => Scale::Linear {
                max: max_value + 5.0,
            },
            ChartKind::NumberOfProjects => Scale::Linear {
                max: max_value + 2.0,
            },
        }
    }

    /// Fraction of the plot height covered by `value`.
    fn fraction(&self, value: f64) -> f64 {
        let fraction = match self {
            Scale::Linear { max } if *max > 0.0 => value / max,
            Scale::Linear { .. } => 0.0,
            Scale::Log { max_exp } if value >= 1.0 && *max_exp > 0.0 => value.log10() / max_exp,
            Scale::Log { .. } => 0.0,
        };
        fraction.clamp(0.0, 1.0)
    }

    fn ticks(&self) -> Vec<(f64, String)> {
        match self {
            Scale::Linear { max } => {
                let step = nice_step(*max / 5.0);
                let mut ticks = Vec::new();
                let mut value = 0.0;
                while value <= *max + f64::EPSILON {
                    ticks.push((value, format_tick(value)));
                    value += step;
                }
                ticks
            }
            Scale::Log { max_exp } => (0..=max_exp.floor() as i32)
                .map(|exp| {
                    let value = 10f64.powi(exp);
                    (value, format_tick(value))
                })
                .collect(),
        }
    }
}

fn nice_step(raw: f64) -> f64 {
    if raw <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_chart(kind: ChartKind, rows: &[CountrySummary], title: &str) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let bottom = MARGIN_TOP + plot_h;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = WIDTH,
        h = HEIGHT
    );
    let _ = writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="40" font-size="28" text-anchor="middle">{}</text>"#,
        WIDTH / 2.0,
        escape(title)
    );
    let _ = writeln!(
        svg,
        r#"<text x="30" y="{y}" font-size="20" text-anchor="middle" transform="rotate(-90 30 {y})">{}</text>"#,
        kind.y_label(),
        y = MARGIN_TOP + plot_h / 2.0
    );

    if rows.is_empty() {
        let _ = writeln!(
            svg,
            r##"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="#888888"/>"##,
            MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="24" text-anchor="middle">No data</text>"#,
            MARGIN_LEFT + plot_w / 2.0,
            MARGIN_TOP + plot_h / 2.0
        );
        svg.push_str("</svg>\n");
        return svg;
    }

    let max_value = rows
        .iter()
        .map(|row| kind.value(row))
        .fold(0.0_f64, f64::max);
    let scale = Scale::for_chart(kind, max_value);

    for (value, label) in scale.ticks() {
        let y = bottom - scale.fraction(value) * plot_h;
        let _ = writeln!(
            svg,
            r##"<line x1="{x1}" y1="{y:.1}" x2="{x2}" y2="{y:.1}" stroke="#dddddd"/>"##,
            x1 = MARGIN_LEFT,
            x2 = MARGIN_LEFT + plot_w,
            y = y
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{:.1}" font-size="16" text-anchor="end">{}</text>"#,
            MARGIN_LEFT - 8.0,
            y + 5.0,
            label
        );
    }

    let slot = plot_w / rows.len() as f64;
    let bar_w = slot * 0.8;
    for (i, row) in rows.iter().enumerate() {
        let value = kind.value(row);
        let bar_h = scale.fraction(value) * plot_h;
        let x = MARGIN_LEFT + slot * i as f64 + (slot - bar_w) / 2.0;
        let center = x + bar_w / 2.0;

        let _ = writeln!(
            svg,
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"><title>{}: {}</title></rect>"#,
            x,
            bottom - bar_h,
            bar_w,
            bar_h,
            PALETTE[i % PALETTE.len()],
            escape(&row.country),
            format_tick(value)
        );
        if kind == ChartKind::PercentageUsage {
            let _ = writeln!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" font-size="18" text-anchor="middle">{:.2}</text>"#,
                center,
                bottom - bar_h - 8.0,
                value
            );
        }
        let _ = writeln!(
            svg,
            r#"<text x="{cx:.1}" y="{y:.1}" font-size="16" text-anchor="end" transform="rotate(-45 {cx:.1} {y:.1})">{}</text>"#,
            escape(&row.country),
            cx = center,
            y = bottom + 20.0
        );
    }

    let _ = writeln!(
        svg,
        r##"<line x1="{x1}" y1="{y}" x2="{x2}" y2="{y}" stroke="#333333"/>"##,
        x1 = MARGIN_LEFT,
        x2 = MARGIN_LEFT + plot_w,
        y = bottom
    );
    svg.push_str("</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<CountrySummary> {
        vec![
            CountrySummary {
                country: "KEN".to_string(),
                project_count: 3,
                submission_total: 900,
                submission_share_percent: 90.0,
            },
            CountrySummary {
                country: "R&D <lab>".to_string(),
                project_count: 1,
                submission_total: 100,
                submission_share_percent: 10.0,
            },
        ]
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            ChartKind::TotalSubmissions.file_name("04_2025"),
            "total_usage_04_2025.svg"
        );
        assert_eq!(
            ChartKind::PercentageUsage.file_name("04_2025"),
            "percentage_usage_04_2025.svg"
        );
        assert_eq!(
            ChartKind::NumberOfProjects.file_name("04_2025"),
            "number_projects_04_2025.svg"
        );
    }

    #[test]
    fn test_one_bar_per_country() {
        for kind in ChartKind::ALL {
            let svg = render_chart(kind, &rows(), "04_2025");
            assert_eq!(svg.matches("<title>").count(), 2);
            assert!(svg.contains("R&amp;D &lt;lab&gt;"));
            assert!(svg.trim_end().ends_with("</svg>"));
        }
    }

    #[test]
    fn test_percentage_chart_labels_bars() {
        let svg = render_chart(ChartKind::PercentageUsage, &rows(), "04_2025");
        assert!(svg.contains(">90.00<"));
        assert!(svg.contains(">10.00<"));
    }

    #[test]
    fn test_log_scale_orders_bars() {
        let scale = Scale::for_chart(ChartKind::TotalSubmissions, 900.0);
        assert!(scale.fraction(900.0) > scale.fraction(100.0));
        assert!(scale.fraction(900.0) < 1.0);
        assert_eq!(scale.fraction(0.0), 0.0);
    }

    #[test]
    fn test_empty_chart_says_no_data() {
        let svg = render_chart(ChartKind::NumberOfProjects, &[], "04_2025");
        assert!(svg.contains("No data"));
        assert!(!svg.contains("<title>"));
    }
}
