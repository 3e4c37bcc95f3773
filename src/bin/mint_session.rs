use clinic_scheduling::auth::{generate_access_token, hash_access_token};

// Prints a fresh bearer token and the hash to store in session_token.session_token_hash.
fn main() {
    let token = generate_access_token();
    println!("token: {token}");
    println!("hash:  {}", hash_access_token(&token));
}
