mod doubles;
mod scenarios;
