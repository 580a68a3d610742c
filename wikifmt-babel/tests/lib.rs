// This file is required to make `cargo test` discover tests in subdirectories.

#[cfg(test)]
mod common;

#[cfg(test)]
mod codec;

#[cfg(test)]
mod diagrams;

#[cfg(test)]
mod surfaces;

#[cfg(test)]
mod session;
