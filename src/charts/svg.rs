use std::f64::consts::PI;
use std::fmt::{self, Write};

const PALETTE: [&str; 10] = [
    "#4c72b0", "#dd8452", "#55a868", "#c44e52", "#8172b3", "#937860", "#da8bc3", "#8c8c8c",
    "#ccb974", "#64b5cd",
];

const TITLE_HEIGHT: f64 = 48.0;
const PANEL_PADDING: f64 = 24.0;
const PANEL_TITLE: f64 = 22.0;
const AXIS_LABEL: f64 = 60.0;

pub fn color(i: usize) -> &'static str {
    PALETTE[i % PALETTE.len()]
}

/// Drawing area of one sub-chart in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Panel {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Panel {
    fn inner(&self) -> Panel {
        Panel {
            x: self.x + PANEL_PADDING,
            y: self.y + PANEL_TITLE + PANEL_PADDING / 2.0,
            width: (self.width - PANEL_PADDING * 2.0).max(1.0),
            height: (self.height - PANEL_TITLE - PANEL_PADDING * 1.5).max(1.0),
        }
    }
}

/// A titled SVG document split into a grid of panels.
pub struct Canvas {
    width: f64,
    height: f64,
    columns: usize,
    rows: usize,
    svg: String,
}

impl Canvas {
    pub fn new(title: &str, columns: usize, rows: usize) -> Result<Self, fmt::Error> {
        let columns = columns.max(1);
        let rows = rows.max(1);
        let width = 560.0 * columns as f64;
        let height = TITLE_HEIGHT + 420.0 * rows as f64;
        let mut svg = String::new();

        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        )?;
        writeln!(
            svg,
            r#"<style>
  .title {{ font-family: sans-serif; font-size: 20px; font-weight: bold; }}
  .panel-title {{ font-family: sans-serif; font-size: 14px; font-weight: bold; }}
  .label {{ font-family: sans-serif; font-size: 11px; fill: #333; }}
  .value {{ font-family: sans-serif; font-size: 10px; fill: #555; }}
  .summary {{ font-family: monospace; font-size: 13px; }}
  .axis {{ stroke: #333; stroke-width: 1; }}
  .edge {{ stroke: #888; stroke-width: 1.5; fill: none; }}
  .node {{ fill: #cfe2f3; stroke: #4c72b0; stroke-width: 1.5; }}
</style>"#
        )?;
        writeln!(svg, r#"<rect x="0" y="0" width="{}" height="{}" fill="white" />"#, width, height)?;
        writeln!(
            svg,
            r#"<text class="title" x="{}" y="32" text-anchor="middle">{}</text>"#,
            width / 2.0,
            escape_xml(title)
        )?;

        Ok(Self {
            width,
            height,
            columns,
            rows,
            svg,
        })
    }

    /// Panel at grid position `index`, counted row-major.
    pub fn panel(&self, index: usize) -> Panel {
        let cell_w = self.width / self.columns as f64;
        let cell_h = (self.height - TITLE_HEIGHT) / self.rows as f64;
        Panel {
            x: (index % self.columns) as f64 * cell_w,
            y: TITLE_HEIGHT + (index / self.columns) as f64 * cell_h,
            width: cell_w,
            height: cell_h,
        }
    }

    fn panel_title(&mut self, panel: Panel, title: &str) -> fmt::Result {
        writeln!(
            self.svg,
            r#"<text class="panel-title" x="{}" y="{}" text-anchor="middle">{}</text>"#,
            panel.x + panel.width / 2.0,
            panel.y + PANEL_TITLE,
            escape_xml(title)
        )
    }

    pub fn bar_chart(&mut self, panel: Panel, title: &str, bars: &[(String, f64)]) -> fmt::Result {
        self.panel_title(panel, title)?;
        let area = panel.inner();
        let plot_h = (area.height - AXIS_LABEL).max(1.0);
        let baseline = area.y + plot_h;
        writeln!(
            self.svg,
            r#"<line class="axis" x1="{}" y1="{}" x2="{}" y2="{}" />"#,
            area.x,
            baseline,
            area.x + area.width,
            baseline
        )?;
        if bars.is_empty() {
            return Ok(());
        }

        let max = bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
        let slot = area.width / bars.len() as f64;
        let bar_w = slot * 0.7;

        for (i, (label, value)) in bars.iter().enumerate() {
            let h = if max > 0.0 { value / max * plot_h } else { 0.0 };
            let x = area.x + slot * i as f64 + (slot - bar_w) / 2.0;
            writeln!(
                self.svg,
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" />"#,
                x,
                baseline - h,
                bar_w,
                h,
                color(i)
            )?;
            writeln!(
                self.svg,
                r#"<text class="value" x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
                x + bar_w / 2.0,
                baseline - h - 3.0,
                format_number(*value)
            )?;
            let lx = x + bar_w / 2.0;
            let ly = baseline + 12.0;
            writeln!(
                self.svg,
                r#"<text class="label" x="{:.1}" y="{:.1}" text-anchor="end" transform="rotate(-45 {:.1} {:.1})">{}</text>"#,
                lx,
                ly,
                lx,
                ly,
                escape_xml(label)
            )?;
        }
        Ok(())
    }

    /// Bars split into one colored segment per series entry.
    pub fn stacked_bars(
        &mut self,
        panel: Panel,
        title: &str,
        series: &[String],
        bars: &[(String, Vec<f64>)],
    ) -> fmt::Result {
        self.panel_title(panel, title)?;
        let area = panel.inner();
        let plot_h = (area.height - AXIS_LABEL).max(1.0);
        let baseline = area.y + plot_h;
        if bars.is_empty() {
            return Ok(());
        }

        let max = bars
            .iter()
            .map(|(_, parts)| parts.iter().sum::<f64>())
            .fold(0.0_f64, f64::max);
        let slot = area.width * 0.8 / bars.len() as f64;
        let bar_w = slot * 0.7;

        for (i, (label, parts)) in bars.iter().enumerate() {
            let x = area.x + slot * i as f64 + (slot - bar_w) / 2.0;
            let mut top = baseline;
            for (s, part) in parts.iter().enumerate() {
                let h = if max > 0.0 { part / max * plot_h } else { 0.0 };
                if h > 0.0 {
                    writeln!(
                        self.svg,
                        r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" />"#,
                        x,
                        top - h,
                        bar_w,
                        h,
                        color(s)
                    )?;
                }
                top -= h;
            }
            let lx = x + bar_w / 2.0;
            let ly = baseline + 12.0;
            writeln!(
                self.svg,
                r#"<text class="label" x="{:.1}" y="{:.1}" text-anchor="end" transform="rotate(-45 {:.1} {:.1})">{}</text>"#,
                lx,
                ly,
                lx,
                ly,
                escape_xml(label)
            )?;
        }

        let legend_x = area.x + area.width * 0.82;
        for (s, name) in series.iter().enumerate() {
            let y = area.y + 14.0 * s as f64;
            writeln!(
                self.svg,
                r#"<rect x="{:.1}" y="{:.1}" width="10" height="10" fill="{}" />"#,
                legend_x,
                y,
                color(s)
            )?;
            writeln!(
                self.svg,
                r#"<text class="label" x="{:.1}" y="{:.1}">{}</text>"#,
                legend_x + 14.0,
                y + 9.0,
                escape_xml(name)
            )?;
        }
        Ok(())
    }

    /// Pie chart; a non-zero `hole` (fraction of the radius) makes it a donut.
    pub fn pie(&mut self, panel: Panel, title: &str, slices: &[(String, f64)], hole: f64) -> fmt::Result {
        self.panel_title(panel, title)?;
        let area = panel.inner();
        let r = (area.width.min(area.height) / 2.0 - 20.0).max(10.0);
        let cx = area.x + area.width / 2.0;
        let cy = area.y + area.height / 2.0;
        let total: f64 = slices.iter().map(|(_, v)| v.max(0.0)).sum();
        if total <= 0.0 {
            return Ok(());
        }

        let mut angle = -PI / 2.0;
        for (i, (label, value)) in slices.iter().enumerate() {
            let share = value.max(0.0) / total;
            if share <= 0.0 {
                continue;
            }
            if share >= 1.0 {
                writeln!(
                    self.svg,
                    r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}" />"#,
                    cx,
                    cy,
                    r,
                    color(i)
                )?;
            } else {
                let sweep = share * 2.0 * PI;
                let (x1, y1) = (cx + r * angle.cos(), cy + r * angle.sin());
                let end = angle + sweep;
                let (x2, y2) = (cx + r * end.cos(), cy + r * end.sin());
                let large = if sweep > PI { 1 } else { 0 };
                writeln!(
                    self.svg,
                    r#"<path d="M {:.1} {:.1} L {:.1} {:.1} A {:.1} {:.1} 0 {} 1 {:.1} {:.1} Z" fill="{}" stroke="white" />"#,
                    cx,
                    cy,
                    x1,
                    y1,
                    r,
                    r,
                    large,
                    x2,
                    y2,
                    color(i)
                )?;
            }

            let mid = angle + share * PI;
            let lr = r + 12.0;
            let anchor = if mid.cos() >= 0.0 { "start" } else { "end" };
            writeln!(
                self.svg,
                r#"<text class="label" x="{:.1}" y="{:.1}" text-anchor="{}">{} ({:.1}%)</text>"#,
                cx + lr * mid.cos(),
                cy + lr * mid.sin(),
                anchor,
                escape_xml(label),
                share * 100.0
            )?;
            angle += share * 2.0 * PI;
        }

        if hole > 0.0 {
            writeln!(
                self.svg,
                r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="white" />"#,
                cx,
                cy,
                r * hole.min(0.95)
            )?;
        }
        Ok(())
    }

    /// Points as `(x, y, weight, label)`; weight scales the marker radius.
    pub fn scatter(
        &mut self,
        panel: Panel,
        title: &str,
        axes: (&str, &str),
        points: &[(f64, f64, f64, String)],
    ) -> fmt::Result {
        self.panel_title(panel, title)?;
        let area = panel.inner();
        let plot_h = (area.height - 30.0).max(1.0);
        let left = area.x + 30.0;
        let plot_w = (area.width - 30.0).max(1.0);
        let baseline = area.y + plot_h;

        writeln!(
            self.svg,
            r#"<line class="axis" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" />"#,
            left,
            baseline,
            left + plot_w,
            baseline
        )?;
        writeln!(
            self.svg,
            r#"<line class="axis" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" />"#,
            left, area.y, left, baseline
        )?;
        writeln!(
            self.svg,
            r#"<text class="label" x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            left + plot_w / 2.0,
            baseline + 22.0,
            escape_xml(axes.0)
        )?;
        writeln!(
            self.svg,
            r#"<text class="label" x="{:.1}" y="{:.1}" text-anchor="middle" transform="rotate(-90 {:.1} {:.1})">{}</text>"#,
            area.x + 8.0,
            area.y + plot_h / 2.0,
            area.x + 8.0,
            area.y + plot_h / 2.0,
            escape_xml(axes.1)
        )?;

        let max_x = points.iter().map(|p| p.0).fold(0.0_f64, f64::max);
        let max_y = points.iter().map(|p| p.1).fold(0.0_f64, f64::max);
        let max_w = points.iter().map(|p| p.2).fold(0.0_f64, f64::max);
        for (i, (x, y, weight, label)) in points.iter().enumerate() {
            let px = left + if max_x > 0.0 { x / max_x * plot_w * 0.95 } else { 0.0 };
            let py = baseline - if max_y > 0.0 { y / max_y * plot_h * 0.95 } else { 0.0 };
            let radius = 4.0 + if max_w > 0.0 { weight / max_w * 10.0 } else { 0.0 };
            writeln!(
                self.svg,
                r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}" fill-opacity="0.6"><title>{}</title></circle>"#,
                px,
                py,
                radius,
                color(i),
                escape_xml(label)
            )?;
        }
        Ok(())
    }

    pub fn text_block(&mut self, panel: Panel, title: &str, lines: &[String]) -> fmt::Result {
        self.panel_title(panel, title)?;
        let area = panel.inner();
        for (i, line) in lines.iter().enumerate() {
            writeln!(
                self.svg,
                r#"<text class="summary" x="{:.1}" y="{:.1}">{}</text>"#,
                area.x,
                area.y + 20.0 + 20.0 * i as f64,
                escape_xml(line)
            )?;
        }
        Ok(())
    }

    /// Nodes on a circle, edges as labeled arrows.
    pub fn network(
        &mut self,
        panel: Panel,
        title: &str,
        nodes: &[String],
        edges: &[(usize, usize, String)],
    ) -> fmt::Result {
        self.panel_title(panel, title)?;
        let area = panel.inner();
        writeln!(
            self.svg,
            r##"<defs><marker id="arrow" viewBox="0 0 10 10" refX="10" refY="5" markerWidth="6" markerHeight="6" orient="auto"><path d="M 0 0 L 10 5 L 0 10 z" fill="#888" /></marker></defs>"##
        )?;

        let cx = area.x + area.width / 2.0;
        let cy = area.y + area.height / 2.0;
        let r = (area.width.min(area.height) / 2.0 - 50.0).max(20.0);
        let positions: Vec<(f64, f64)> = (0..nodes.len())
            .map(|i| {
                if nodes.len() == 1 {
                    return (cx, cy);
                }
                let a = -PI / 2.0 + 2.0 * PI * i as f64 / nodes.len() as f64;
                (cx + r * a.cos(), cy + r * a.sin())
            })
            .collect();
        let node_r = 28.0;

        for (from, to, label) in edges {
            let (Some(&(x1, y1)), Some(&(x2, y2))) = (positions.get(*from), positions.get(*to)) else {
                continue;
            };
            if from == to {
                writeln!(
                    self.svg,
                    r#"<path class="edge" d="M {:.1} {:.1} C {:.1} {:.1} {:.1} {:.1} {:.1} {:.1}" marker-end="url(#arrow)" />"#,
                    x1 - 10.0,
                    y1 - node_r,
                    x1 - 40.0,
                    y1 - node_r - 50.0,
                    x1 + 40.0,
                    y1 - node_r - 50.0,
                    x1 + 10.0,
                    y1 - node_r
                )?;
                writeln!(
                    self.svg,
                    r#"<text class="value" x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
                    x1,
                    y1 - node_r - 42.0,
                    escape_xml(label)
                )?;
                continue;
            }
            let (dx, dy) = (x2 - x1, y2 - y1);
            let len = (dx * dx + dy * dy).sqrt().max(1.0);
            let (ux, uy) = (dx / len, dy / len);
            writeln!(
                self.svg,
                r#"<line class="edge" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" marker-end="url(#arrow)" />"#,
                x1 + ux * node_r,
                y1 + uy * node_r,
                x2 - ux * node_r,
                y2 - uy * node_r
            )?;
            writeln!(
                self.svg,
                r#"<text class="value" x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
                (x1 + x2) / 2.0,
                (y1 + y2) / 2.0 - 4.0,
                escape_xml(label)
            )?;
        }

        for (name, (x, y)) in nodes.iter().zip(&positions) {
            writeln!(
                self.svg,
                r#"<circle class="node" cx="{:.1}" cy="{:.1}" r="{}" />"#,
                x, y, node_r
            )?;
            writeln!(
                self.svg,
                r#"<text class="label" x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
                x,
                y + 4.0,
                escape_xml(name)
            )?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<String, fmt::Error> {
        writeln!(self.svg, "</svg>")?;
        Ok(self.svg)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn test_canvas_document() {
        let canvas = Canvas::new("Shop <db>", 2, 2).unwrap();
        let p = canvas.panel(3);
        assert_eq!(p.x, 560.0);
        assert_eq!(p.y, TITLE_HEIGHT + 420.0);
        let svg = canvas.finish().unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Shop &lt;db&gt;"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_bar_and_pie() {
        let mut canvas = Canvas::new("t", 2, 1).unwrap();
        let bars = vec![("users".to_string(), 3.0), ("orders".to_string(), 1.5)];
        canvas.bar_chart(canvas.panel(0), "Columns", &bars).unwrap();
        canvas.pie(canvas.panel(1), "Share", &bars, 0.0).unwrap();
        let svg = canvas.finish().unwrap();
        assert!(svg.contains(">users</text>"));
        assert!(svg.contains(">1.50</text>"));
        assert!(svg.contains("users (66.7%)"));
        assert!(svg.contains("<path d=\"M"));
    }

    #[test]
    fn test_single_slice_is_a_circle() {
        let mut canvas = Canvas::new("t", 1, 1).unwrap();
        canvas
            .pie(canvas.panel(0), "All", &[("TEXT".to_string(), 4.0)], 0.4)
            .unwrap();
        let svg = canvas.finish().unwrap();
        assert!(svg.contains("TEXT (100.0%)"));
        assert_eq!(svg.matches("<circle").count(), 2);
    }

    #[test]
    fn test_network_edges() {
        let mut canvas = Canvas::new("t", 1, 1).unwrap();
        let nodes = vec!["orders".to_string(), "customers".to_string()];
        canvas
            .network(canvas.panel(0), "Relations", &nodes, &[(0, 1, "customer_id → id".into())])
            .unwrap();
        let svg = canvas.finish().unwrap();
        assert!(svg.contains("customer_id → id"));
        assert!(svg.contains("marker-end=\"url(#arrow)\""));
        assert_eq!(svg.matches("class=\"node\"").count(), 2);
    }
}
