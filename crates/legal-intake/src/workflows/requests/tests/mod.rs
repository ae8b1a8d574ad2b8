mod common;
mod gate;
mod routing;
mod submission;
