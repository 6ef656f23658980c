//! Plain-text table for a [`BoardView`]: one line per criterion plus totals.

use std::fmt::Write as _;

use crate::board::BoardView;
use crate::reconcile::GrandTotal;

pub const HEADERS: [&str; 7] = [
    "Criteria Name",
    "Score",
    "% of Total",
    "Weighting",
    "Weighted Score",
    "%-w Total",
    "w-%-Lock",
];

const WIDTHS: [usize; 7] = [14, 7, 11, 10, 15, 10, 9];

/// `—` stands in for an undefined weighted total.
pub fn format_total(total: &GrandTotal) -> String {
    match total.value() {
        Some(t) => format!("{t:.2}"),
        None => "—".to_string(),
    }
}

fn pct(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}

fn push_line(out: &mut String, cells: [String; 7]) {
    let mut line = String::new();
    for (cell, w) in cells.iter().zip(WIDTHS) {
        let _ = write!(line, "{cell:<w$} ");
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

pub fn table(view: &BoardView) -> String {
    let mut out = String::new();
    push_line(&mut out, HEADERS.map(str::to_string));

    for r in &view.rows {
        push_line(
            &mut out,
            [
                r.name.clone(),
                format!("{:.0}", r.score),
                pct(r.score_share),
                format!("{:.2}", r.weight),
                format!("{:.2}", r.weighted_score),
                pct(r.share),
                if r.locked { "locked" } else { "-" }.to_string(),
            ],
        );
    }

    let t = &view.totals;
    push_line(
        &mut out,
        [
            "Totals".to_string(),
            format!("{:.0}", t.total_score),
            pct(t.score_share_sum),
            String::new(),
            format_total(&t.weighted_total),
            pct(t.share_sum),
            String::new(),
        ],
    );

    let _ = writeln!(out, "Total locked %-w: {}", pct(t.locked_share_total));
    if t.over_committed {
        out.push_str("Invalid state: total locked %-w is 100% or more. Unlock one or more rows.\n");
    }
    for d in &view.divergences {
        let _ = writeln!(
            out,
            "{} holds {} of a {} target ({:?})",
            crate::board::Board::name(d.index),
            pct(d.realized),
            pct(d.requested),
            d.cause
        );
    }
    out
}
