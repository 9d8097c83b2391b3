mod lists;
mod migrations;
