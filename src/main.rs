use {
    clap::Parser,
    polymerization::{Args, RunQuestions, Solution},
};

fn main() {
    Solution::run(&Args::parse());
}
