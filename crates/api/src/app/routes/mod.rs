pub mod registrants;
