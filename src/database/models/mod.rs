pub mod annotation;
pub mod dragable;
pub mod team;
pub mod user;

pub use annotation::{Annotation, AnnotationBody, AnnotationKind, AnnotationRow};
pub use dragable::Dragable;
pub use team::Team;
pub use user::User;
