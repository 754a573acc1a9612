mod support;

mod drain;
