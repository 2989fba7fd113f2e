mod hart_aber_fair;
mod illner;
mod lanz;
mod maischberger;
mod phoenix_runde;

pub use hart_aber_fair::HartAberFair;
pub use illner::Illner;
pub use lanz::Lanz;
pub use maischberger::Maischberger;
pub use phoenix_runde::PhoenixRunde;
