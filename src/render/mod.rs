/// Rasterization of map figures to PNG.
///
/// ```text
///   FigureSpec ──► figure ──► map (per panel) ──► canvas ──► PNG
///                     │                              ▲
///                     └──► colorbar ─────────────────┘
///                     ticks / font feed both
/// ```

pub mod canvas;
pub mod colorbar;
pub mod figure;
pub mod font;
pub mod map;
pub mod ticks;
