pub mod ranked_bars;
pub mod ratios;
