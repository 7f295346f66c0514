pub mod entity;
pub mod ids;

pub use entity::{
    Board, BoardList, BoardView, Card, Label, ListView, MAX_TITLE_LEN, Priority, validate_name,
    validate_title,
};
pub use ids::{BoardId, CardId, LabelId, ListId, UserId};
