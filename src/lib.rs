pub mod config;
pub mod engine;
pub mod run;

#[cfg(test)]
mod test;
