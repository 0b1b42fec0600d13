mod match_world;
mod steps;

pub use match_world::MatchWorld;
