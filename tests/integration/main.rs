mod create_mirror;
