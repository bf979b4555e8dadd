use ethers::prelude::abigen;

// Generates the call encodings for the `FaultDisputeGame` contract.
abigen!(
    FaultDisputeGame,
    r"[
        function step(uint256 claimIndex, bool isAttack, bytes calldata stateData, bytes calldata proof) external
        function addLocalData(uint256 ident, uint256 partOffset) external
    ]"
);

// Generates the call encodings for the `PreimageOracle` contract.
abigen!(
    PreimageOracle,
    r"[
        function loadLocalData(uint256 ident, bytes32 localContext, bytes32 word, uint256 size, uint256 partOffset) external returns (bytes32 key)
        function loadKeccak256PreimagePart(uint256 partOffset, bytes calldata preimage) external
    ]"
);
