pub mod assess;
pub mod checkpoint;
pub mod run;
