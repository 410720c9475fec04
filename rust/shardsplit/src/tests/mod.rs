mod split_tests;
