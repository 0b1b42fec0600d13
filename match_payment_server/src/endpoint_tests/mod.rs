mod helpers;
mod matches;
mod mocks;
mod payments;
