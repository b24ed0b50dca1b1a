// Business logic services layer
//
// Pure services shared by the import session and the CLI.

pub mod matching;
