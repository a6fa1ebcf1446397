use sha1::{Digest, Sha1};

// https://dev.mysql.com/doc/internals/en/secure-password-authentication.html
// https://mariadb.com/kb/en/connection/#mysql_native_password-plugin

/// Compute the `mysql_native_password` response for the server's 20-byte
/// scramble: `SHA1( password ) ^ SHA1( nonce + SHA1( SHA1( password ) ) )`.
///
/// An empty password authenticates with an empty response.
pub(crate) fn native_password(nonce: &[u8], password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let mut hasher = Sha1::new();

    hasher.update(password);

    // SHA1( password )
    let mut pw_sha1 = hasher.finalize_reset();

    hasher.update(pw_sha1);

    // SHA1( SHA1( password ) )
    let pw_sha1_sha1 = hasher.finalize_reset();

    // NOTE: use the first 20 bytes of the nonce, the server MAY have sent a
    //       trailing NUL terminator
    hasher.update(&nonce[..nonce.len().min(20)]);
    hasher.update(pw_sha1_sha1);

    // SHA1( nonce + SHA1( SHA1( password ) ) )
    let nonce_pw_sha1_sha1 = hasher.finalize();

    for (value, mask) in pw_sha1.iter_mut().zip(nonce_pw_sha1_sha1.iter()) {
        *value ^= mask;
    }

    pw_sha1.to_vec()
}
